//! Link extraction from fetched subscription bodies
//!
//! A body is either base64-encoded link text or the link text itself. Every
//! `vless://` run of non-whitespace is a candidate; candidates whose content
//! was already seen during the run are dropped, the rest are relabelled with
//! the product tag and a geo marker.

use crate::proxy::dedup::SeenKeys;
use crate::proxy::geo::{host_marker, GeoTagger};
use crate::proxy::models::{
    host_token, strip_label, GeoMarker, HostResolution, Link, MatchOutcome, SkipReason,
    LINK_SCHEME,
};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::net::Ipv4Addr;

/// Default product tag placed in front of the marker in every label
pub const DEFAULT_LABEL_TAG: &str = "SHΞN™";

/// Matches a link: the scheme followed by a run of non-whitespace
static LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{}\S+", regex::escape(LINK_SCHEME))).expect("Invalid link regex")
});

/// Standard alphabet; subscription publishers often drop the padding
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Text to scan, and which decoding produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedBody {
    /// The whole body was valid base64; invalid UTF-8 bytes are dropped
    Base64(String),
    /// The body is scanned as-is
    Plain(String),
}

impl DecodedBody {
    pub fn text(&self) -> &str {
        match self {
            DecodedBody::Base64(text) | DecodedBody::Plain(text) => text,
        }
    }

    pub fn is_base64(&self) -> bool {
        matches!(self, DecodedBody::Base64(_))
    }
}

/// Best-effort base64 decode of a whole body.
///
/// Whitespace (line wrapping) is ignored. Anything that is not valid base64
/// falls back to the original text. Decoded bytes that are not valid UTF-8
/// are dropped so one bad byte does not hide the links around it.
pub fn decode_body(raw: &str) -> DecodedBody {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return DecodedBody::Plain(raw.to_string());
    }

    match LENIENT_BASE64.decode(compact.as_bytes()) {
        Ok(bytes) => DecodedBody::Base64(utf8_ignoring_invalid(&bytes)),
        Err(_) => DecodedBody::Plain(raw.to_string()),
    }
}

fn utf8_ignoring_invalid(bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(text) => text.to_string(),
        Cow::Owned(text) => text.replace(char::REPLACEMENT_CHARACTER, ""),
    }
}

/// Classify the host token of link content
pub fn resolve_host(content: &str) -> HostResolution {
    let Some(host) = host_token(content) else {
        return HostResolution::Unresolved;
    };

    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return HostResolution::ResolvedIp(ip);
    }

    host_marker(host).map_or(HostResolution::Unresolved, HostResolution::ResolvedMarker)
}

/// Everything that happened while extracting one body
#[derive(Debug, Clone)]
pub struct Extraction {
    pub body: DecodedBody,
    pub outcomes: Vec<MatchOutcome>,
}

impl Extraction {
    /// Accepted links in scan order
    pub fn links(self) -> Vec<Link> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                MatchOutcome::Accepted(link) => Some(link),
                _ => None,
            })
            .collect()
    }

    pub fn duplicates(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Duplicate(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Skipped(_)))
            .count()
    }
}

/// Extracts and relabels links, deduplicating against the run's seen keys
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    tagger: GeoTagger,
    seen: SeenKeys,
    label_tag: String,
}

impl LinkExtractor {
    pub fn new(tagger: GeoTagger, seen: SeenKeys, label_tag: impl Into<String>) -> Self {
        Self {
            tagger,
            seen,
            label_tag: label_tag.into(),
        }
    }

    /// Extract the new links of a body
    pub fn extract(&self, raw_body: &str) -> Vec<Link> {
        self.extract_detailed(raw_body).links()
    }

    /// Extract a body, keeping the decode branch and every match outcome
    pub fn extract_detailed(&self, raw_body: &str) -> Extraction {
        let body = decode_body(raw_body);
        let outcomes = LINK_REGEX
            .find_iter(body.text())
            .map(|m| self.process_match(m.as_str()))
            .collect();

        Extraction { body, outcomes }
    }

    /// Dedup and relabel a single matched link
    pub fn process_match(&self, matched: &str) -> MatchOutcome {
        let content = strip_label(matched.trim());
        if content.len() <= LINK_SCHEME.len() {
            tracing::debug!(link = %matched, "Skipping link without content");
            return MatchOutcome::Skipped(SkipReason::EmptyContent);
        }

        if !self.seen.insert(content) {
            return MatchOutcome::Duplicate(content.to_string());
        }

        let marker = self.marker_for(content);
        MatchOutcome::Accepted(Link::new(content, self.label(marker)))
    }

    fn marker_for(&self, content: &str) -> GeoMarker {
        match resolve_host(content) {
            HostResolution::ResolvedIp(ip) => self.tagger.mark(&ip.to_string()),
            HostResolution::ResolvedMarker(marker) => marker,
            HostResolution::Unresolved => GeoMarker::Unknown,
        }
    }

    fn label(&self, marker: GeoMarker) -> String {
        format!("{} {}", self.label_tag, marker.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
    use base64::Engine as _;
    use pretty_assertions::assert_eq;

    fn extractor() -> LinkExtractor {
        LinkExtractor::new(GeoTagger::new(), SeenKeys::new(), DEFAULT_LABEL_TAG)
    }

    #[test]
    fn test_relabels_ip_link() {
        let links = extractor().extract("vless://user@1.1.1.1:443?x=1#old");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].authority(), Some("1.1.1.1:443"));
        assert_eq!(links[0].label(), "SHΞN™ 🇺🇸");
        assert_eq!(links[0].to_string(), "vless://user@1.1.1.1:443?x=1#SHΞN™ 🇺🇸");
    }

    #[test]
    fn test_relabels_domain_link_without_lookup() {
        let links = extractor().extract("vless://id@berlin.example.de:443?type=ws#x");
        assert_eq!(links[0].label(), "SHΞN™ 🇩🇪");
    }

    #[test]
    fn test_unresolved_host_gets_unknown_marker() {
        let links = extractor().extract("vless://id@example.com:443#x\nvless://nohost#y");
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.label() == "SHΞN™ 🏳️"));
    }

    #[test]
    fn test_resolve_host_kinds() {
        assert_eq!(
            resolve_host("vless://u@8.8.8.8:443"),
            HostResolution::ResolvedIp(Ipv4Addr::new(8, 8, 8, 8))
        );
        assert_eq!(
            resolve_host("vless://u@node.example.nl:443"),
            HostResolution::ResolvedMarker(GeoMarker::Region("NL"))
        );
        assert_eq!(resolve_host("vless://u@example.com:443"), HostResolution::Unresolved);
        assert_eq!(resolve_host("vless://example.com:443"), HostResolution::Unresolved);
    }

    #[test]
    fn test_decode_base64_body() {
        let plain = "vless://a@8.8.8.8:443#x\nvless://b@example.fr:443#y\n";
        let decoded = decode_body(&STANDARD.encode(plain));
        assert!(decoded.is_base64());
        assert_eq!(decoded.text(), plain);
    }

    #[test]
    fn test_decode_unpadded_and_wrapped_base64() {
        let plain = "vless://a@8.8.8.8:443#x\nvless://b@example.fr:443#y";
        let encoded = STANDARD_NO_PAD.encode(plain);
        let wrapped = format!("{}\n{}\n", &encoded[..20], &encoded[20..]);
        let decoded = decode_body(&wrapped);
        assert_eq!(decoded, DecodedBody::Base64(plain.to_string()));
    }

    #[test]
    fn test_decode_falls_back_to_plain() {
        let body = "vless://a@8.8.8.8:443#x";
        assert_eq!(decode_body(body), DecodedBody::Plain(body.to_string()));
        assert_eq!(decode_body("   "), DecodedBody::Plain("   ".to_string()));
    }

    #[test]
    fn test_decode_drops_invalid_utf8_bytes() {
        let mut bytes = b"vless://a@1.1.1.1:443#x\nvless://b@8.8.8.8:443#".to_vec();
        bytes.push(0xE9);
        let decoded = decode_body(&STANDARD.encode(&bytes));
        assert_eq!(
            decoded,
            DecodedBody::Base64("vless://a@1.1.1.1:443#x\nvless://b@8.8.8.8:443#".to_string())
        );
    }

    #[test]
    fn test_extract_keeps_links_around_invalid_utf8() {
        let mut bytes = b"vless://a@1.1.1.1:443#x\n".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b"\nvless://b@8.8.8.8:443#");
        bytes.push(0xE9);

        let links = extractor().extract(&STANDARD.encode(&bytes));
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].to_string(), "vless://b@8.8.8.8:443#SHΞN™ 🇺🇸");
    }

    #[test]
    fn test_extract_from_base64_body() {
        let plain = "vless://a@8.8.8.8:443#x\nvless://b@example.fr:443#y\n";
        let extraction = extractor().extract_detailed(&STANDARD.encode(plain));
        assert!(extraction.body.is_base64());
        let links = extraction.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].label(), "SHΞN™ 🇺🇸");
        assert_eq!(links[1].label(), "SHΞN™ 🇫🇷");
    }

    #[test]
    fn test_duplicates_within_body() {
        let body = "vless://u@2.2.2.2:443#a\nvless://u@2.2.2.2:443#b\nvless://v@2.2.2.2:443#c";
        let extraction = extractor().extract_detailed(body);
        assert_eq!(extraction.duplicates(), 1);
        assert_eq!(
            extraction.outcomes[1],
            MatchOutcome::Duplicate("vless://u@2.2.2.2:443".to_string())
        );
        assert_eq!(extraction.links().len(), 2);
    }

    #[test]
    fn test_duplicates_across_bodies_share_seen_keys() {
        let extractor = extractor();
        assert_eq!(extractor.extract("vless://u@2.2.2.2:443#a").len(), 1);
        assert!(extractor.extract("vless://u@2.2.2.2:443#b").is_empty());
    }

    #[test]
    fn test_empty_link_is_skipped() {
        let extraction = extractor().extract_detailed("vless:// vless://#label vless://a@1.1.1.1:1");
        assert_eq!(extraction.skipped(), 1);
        assert_eq!(extraction.links().len(), 1);
    }

    #[test]
    fn test_links_embedded_in_text() {
        let body = r#"<pre>vless://a@46.1.1.1:443#one</pre> and vless://b@78.1.1.1:443 end"#;
        let links = extractor().extract(body);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].dedup_key(), "vless://b@78.1.1.1:443");
        assert_eq!(links[1].label(), "SHΞN™ 🇪🇺");
    }

    #[test]
    fn test_extraction_is_idempotent_with_fresh_seen_keys() {
        let body = "vless://a@1.1.1.1:443#x\nvless://b@example.ir:80#y\nvless://a@1.1.1.1:443#z";
        assert_eq!(extractor().extract(body), extractor().extract(body));
    }

    #[test]
    fn test_custom_label_tag() {
        let extractor = LinkExtractor::new(GeoTagger::new(), SeenKeys::new(), "Mirror");
        let links = extractor.extract("vless://a@9.9.9.9:443");
        assert_eq!(links[0].label(), "Mirror 🏳️");
    }
}
