//! Subscription data models

use std::fmt;
use std::net::Ipv4Addr;

/// Scheme prefix of every link the aggregator handles
pub const LINK_SCHEME: &str = "vless://";

/// Separator between a link's content and its display label
const LABEL_SEPARATOR: char = '#';

/// Coarse geographic marker attached to a link label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeoMarker {
    /// Two-letter region code (ISO 3166-1 alpha-2, plus `EU`)
    Region(&'static str),
    #[default]
    Unknown,
}

impl GeoMarker {
    /// Region code, if the marker is not unknown
    pub fn code(&self) -> Option<&'static str> {
        match self {
            GeoMarker::Region(code) => Some(*code),
            GeoMarker::Unknown => None,
        }
    }

    /// Render the marker as a flag emoji.
    ///
    /// Region codes map onto Unicode regional indicator symbols, so `US`
    /// becomes 🇺🇸 and `EU` becomes 🇪🇺. Unknown markers use a white flag.
    pub fn flag(&self) -> String {
        match self {
            GeoMarker::Region(code) if code.len() == 2 && code.is_ascii() => code
                .bytes()
                .map(|b| b.to_ascii_uppercase())
                .filter_map(|b| char::from_u32(0x1F1E6 + u32::from(b.saturating_sub(b'A'))))
                .collect(),
            _ => String::from("\u{1F3F3}\u{FE0F}"),
        }
    }
}

impl fmt::Display for GeoMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

/// Proxy connection link with a rewritten display label
///
/// The link content (everything before the first `#`) is kept verbatim and
/// doubles as the dedup key; the label is replaced on extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    content: String,
    label: String,
}

impl Link {
    /// Create a link from raw text, discarding any existing label
    pub fn new(raw: &str, label: String) -> Self {
        Self {
            content: strip_label(raw).to_string(),
            label,
        }
    }

    /// Link content without its label, used for deduplication
    pub fn dedup_key(&self) -> &str {
        &self.content
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Authority segment in `host:port` form (credentials and query removed)
    ///
    /// Credentials end at the first `@`, as in [`host_token`].
    pub fn authority(&self) -> Option<&str> {
        let rest = self.content.split_once("://")?.1;
        let end = rest.find(['?', '/']).unwrap_or(rest.len());
        let rest = &rest[..end];
        let authority = rest.split_once('@').map_or(rest, |(_, after)| after);
        (!authority.is_empty()).then_some(authority)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.content, LABEL_SEPARATOR, self.label)
    }
}

/// Strip a trailing `#label` from raw link text
pub fn strip_label(raw: &str) -> &str {
    raw.split_once(LABEL_SEPARATOR).map_or(raw, |(content, _)| content)
}

/// Host token of a raw link: the text between `@` and the next `:`
pub fn host_token(raw: &str) -> Option<&str> {
    let rest = raw.split_once("://")?.1;
    let (userinfo, after_at) = rest.split_once('@')?;
    let (host, _) = after_at.split_once(':')?;
    (!userinfo.is_empty() && !host.is_empty()).then_some(host)
}

/// How a link's host token was resolved to a marker source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostResolution {
    /// Host is an IPv4 literal, to be tagged through the IP prefix table
    ResolvedIp(Ipv4Addr),
    /// Host name matched a keyword heuristic directly
    ResolvedMarker(GeoMarker),
    /// No host token, or nothing matched
    Unresolved,
}

/// Why a matched link was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing but the scheme prefix (and maybe a label) was matched
    EmptyContent,
}

/// Outcome of processing one matched link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Accepted(Link),
    /// Dedup key was already seen during this run
    Duplicate(String),
    Skipped(SkipReason),
}

/// Candidate subscription endpoint found in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUrl(String);

impl SourceUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the fan-out stage stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Every source was fetched
    #[default]
    Exhausted,
    /// The link cap was reached
    CapReached,
    /// The total time budget ran out
    BudgetElapsed,
}

/// Deduplicated links collected during one run, in merge order
#[derive(Debug, Clone, Default)]
pub struct AggregationResult {
    pub links: Vec<Link>,
    pub sources_attempted: usize,
    pub sources_contributed: usize,
    pub stop_reason: StopReason,
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links rendered one per entry, ready for output
    pub fn lines(&self) -> Vec<String> {
        self.links.iter().map(Link::to_string).collect()
    }
}
