//! Geo tagging for link hosts using static lookup tables
//!
//! Accuracy is best effort: IPv4 literals are matched against a short list of
//! well-known prefixes and host names against TLD/keyword heuristics. No
//! network lookups are performed.

use crate::proxy::models::GeoMarker;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

/// IPv4 prefix rules, tried in order
const IP_PREFIX_RULES: &[(&str, GeoMarker)] = &[
    ("1.1.1.", GeoMarker::Region("US")),
    ("8.8.8.", GeoMarker::Region("US")),
    ("104.", GeoMarker::Region("US")),
    ("172.", GeoMarker::Region("US")),
    ("185.", GeoMarker::Region("EU")),
    ("46.", GeoMarker::Region("EU")),
    ("78.", GeoMarker::Region("EU")),
    ("91.", GeoMarker::Region("EU")),
];

/// Host name rule: a TLD suffix and optional keywords, both case-insensitive
struct HostRule {
    tld: &'static str,
    keywords: &'static [&'static str],
    marker: GeoMarker,
}

const HOST_RULES: &[HostRule] = &[
    HostRule {
        tld: ".ir",
        keywords: &[],
        marker: GeoMarker::Region("IR"),
    },
    HostRule {
        tld: ".de",
        keywords: &["germany"],
        marker: GeoMarker::Region("DE"),
    },
    HostRule {
        tld: ".fr",
        keywords: &["france"],
        marker: GeoMarker::Region("FR"),
    },
    HostRule {
        tld: ".nl",
        keywords: &["netherlands"],
        marker: GeoMarker::Region("NL"),
    },
    HostRule {
        tld: ".us",
        keywords: &["usa"],
        marker: GeoMarker::Region("US"),
    },
];

impl HostRule {
    fn matches(&self, host: &str) -> bool {
        host.ends_with(self.tld) || self.keywords.iter().any(|k| host.contains(k))
    }
}

/// Marker for an IPv4 address from the prefix table
pub fn ip_marker(ip: &Ipv4Addr) -> Option<GeoMarker> {
    let ip = ip.to_string();
    IP_PREFIX_RULES
        .iter()
        .find(|(prefix, _)| ip.starts_with(prefix))
        .map(|(_, marker)| *marker)
}

/// Marker for a host name from the TLD/keyword heuristics
pub fn host_marker(host: &str) -> Option<GeoMarker> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    HOST_RULES
        .iter()
        .find(|rule| rule.matches(&host))
        .map(|rule| rule.marker)
}

/// Geo tagger with a process-lifetime cache
///
/// Clones share the same cache, so one tagger can be handed to every
/// concurrent fetch task.
#[derive(Debug, Clone, Default)]
pub struct GeoTagger {
    cache: Arc<Mutex<HashMap<String, GeoMarker>>>,
}

impl GeoTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker for an IPv4 literal or host name.
    ///
    /// IP prefix rules win for IPv4 literals; host heuristics apply to host
    /// names and to IPs no prefix matched. Falls back to
    /// [`GeoMarker::Unknown`]. Results are memoized by the exact input.
    pub fn mark(&self, host_or_ip: &str) -> GeoMarker {
        // Lookup and insert happen under one lock so concurrent callers
        // never race on the same key.
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(marker) = cache.get(host_or_ip) {
            return *marker;
        }

        let marker = Self::classify(host_or_ip);
        cache.insert(host_or_ip.to_string(), marker);
        marker
    }

    fn classify(host_or_ip: &str) -> GeoMarker {
        host_or_ip
            .parse::<Ipv4Addr>()
            .ok()
            .and_then(|ip| ip_marker(&ip))
            .or_else(|| host_marker(host_or_ip))
            .unwrap_or_default()
    }

    /// Number of memoized entries
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_prefix_rules() {
        let tagger = GeoTagger::new();
        assert_eq!(tagger.mark("1.1.1.1"), GeoMarker::Region("US"));
        assert_eq!(tagger.mark("8.8.8.8"), GeoMarker::Region("US"));
        assert_eq!(tagger.mark("104.16.0.1"), GeoMarker::Region("US"));
        assert_eq!(tagger.mark("185.10.10.10"), GeoMarker::Region("EU"));
        assert_eq!(tagger.mark("91.200.1.1"), GeoMarker::Region("EU"));
    }

    #[test]
    fn test_unmatched_ip_is_unknown() {
        let tagger = GeoTagger::new();
        assert_eq!(tagger.mark("2.2.2.2"), GeoMarker::Unknown);
        // "1.1.10.1" shares digits with "1.1.1." but not the prefix
        assert_eq!(tagger.mark("1.1.10.1"), GeoMarker::Unknown);
    }

    #[test]
    fn test_host_heuristics() {
        let tagger = GeoTagger::new();
        assert_eq!(tagger.mark("node.example.ir"), GeoMarker::Region("IR"));
        assert_eq!(tagger.mark("fast.example.de"), GeoMarker::Region("DE"));
        assert_eq!(tagger.mark("Germany-1.example.com"), GeoMarker::Region("DE"));
        assert_eq!(tagger.mark("paris.france.example.com"), GeoMarker::Region("FR"));
        assert_eq!(tagger.mark("ams.example.nl"), GeoMarker::Region("NL"));
        assert_eq!(tagger.mark("usa1.example.com"), GeoMarker::Region("US"));
        assert_eq!(tagger.mark("example.com"), GeoMarker::Unknown);
    }

    #[test]
    fn test_rule_order_first_match_wins() {
        // Matches both the .de suffix and the "france" keyword
        assert_eq!(host_marker("france.example.de"), Some(GeoMarker::Region("DE")));
    }

    #[test]
    fn test_mark_is_memoized_and_deterministic() {
        let tagger = GeoTagger::new();
        let first = tagger.mark("46.1.2.3");
        let second = tagger.mark("46.1.2.3");
        assert_eq!(first, second);
        assert_eq!(tagger.cached(), 1);

        tagger.mark("unknown.example.com");
        assert_eq!(tagger.cached(), 2);
    }

    #[test]
    fn test_clones_share_cache() {
        let tagger = GeoTagger::new();
        let clone = tagger.clone();
        clone.mark("1.1.1.1");
        assert_eq!(tagger.cached(), 1);
    }

    #[test]
    fn test_concurrent_marking() {
        let tagger = GeoTagger::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tagger = tagger.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| tagger.mark(&format!("185.0.0.{}", i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            let markers = handle.join().unwrap();
            assert!(markers.iter().all(|m| *m == GeoMarker::Region("EU")));
        }
        assert_eq!(tagger.cached(), 50);
    }
}
