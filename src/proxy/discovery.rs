//! Discovery of subscription sources from a root manifest
//!
//! The manifest is free-form text (usually JSON). Every `http(s)://` run is a
//! candidate; candidates are kept when their host is on the allow-list and
//! their text mentions a subscription keyword.

use crate::proxy::crawler::Fetcher;
use crate::proxy::models::SourceUrl;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Default timeout for the manifest fetch in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default cap on discovered sources
const DEFAULT_MAX_SOURCES: usize = 20;

const DEFAULT_ALLOWED_HOSTS: &[&str] = &["github", "raw.githubusercontent", "gitlab"];

const DEFAULT_KEYWORDS: &[&str] = &["vless", "v2ray", "sub"];

/// Quoting and escape leftovers that trail URLs embedded in JSON or markup
const TRAILING_ARTIFACTS: &[char] = &['\\', '"', '\'', ',', ';', ')', ']', '}', '>'];

/// Matches an http(s) URL up to whitespace, a quote or a backslash escape
static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s\\"]+"#).expect("Invalid URL regex"));

/// Configuration for source discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Timeout for the manifest request
    pub timeout: Duration,
    /// A source's host must contain one of these
    pub allowed_hosts: Vec<String>,
    /// A source's URL must contain one of these (case-insensitive)
    pub keywords: Vec<String>,
    /// Maximum number of sources returned
    pub max_sources: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|s| s.to_string()).collect(),
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            max_sources: DEFAULT_MAX_SOURCES,
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_allowed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.allowed_hosts = hosts;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }
}

/// Finds subscription sources listed in a manifest
#[derive(Debug, Clone)]
pub struct SourceDiscovery {
    fetcher: Fetcher,
    config: DiscoveryConfig,
}

impl SourceDiscovery {
    pub fn new(fetcher: Fetcher, config: DiscoveryConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetch the manifest and return its sources.
    ///
    /// A manifest that cannot be fetched yields no sources.
    pub async fn discover(&self, manifest_url: &str) -> Vec<SourceUrl> {
        match self.fetcher.fetch_text(manifest_url, self.config.timeout).await {
            Ok(body) => self.extract_sources(&body),
            Err(e) => {
                tracing::error!(url = %manifest_url, error = %e, "Failed to get source URLs");
                Vec::new()
            }
        }
    }

    /// Filtered, capped sources found in manifest text, in scan order
    pub fn extract_sources(&self, manifest: &str) -> Vec<SourceUrl> {
        let mut seen = HashSet::new();
        let candidates: Vec<&str> = URL_REGEX
            .find_iter(manifest)
            .map(|m| clean_candidate(m.as_str()))
            .filter(|url| self.accepts(url))
            .filter(|url| seen.insert(*url))
            .collect();

        tracing::info!(
            found = candidates.len(),
            max = self.config.max_sources,
            "Found subscription URLs"
        );

        candidates
            .into_iter()
            .take(self.config.max_sources)
            .map(SourceUrl::new)
            .collect()
    }

    /// Whether a cleaned candidate passes the host and keyword filters
    pub fn accepts(&self, candidate: &str) -> bool {
        let Ok(url) = Url::parse(candidate) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        let host_allowed = self
            .config
            .allowed_hosts
            .iter()
            .any(|allowed| host.contains(allowed.as_str()));

        let text = candidate.to_lowercase();
        let has_keyword = self
            .config
            .keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()));

        host_allowed && has_keyword
    }
}

/// Strip stray escape and quoting characters from the end of a match
fn clean_candidate(raw: &str) -> &str {
    raw.trim_end_matches(TRAILING_ARTIFACTS)
}
