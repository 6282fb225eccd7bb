//! Sub Aggregator - VLESS subscription aggregator
//!
//! Discovers subscription sources from a manifest, fetches them concurrently,
//! deduplicates and geo-tags their links, and renders a single subscription
//! document.

pub mod output;
pub mod proxy;

pub use output::SubscriptionDocument;
pub use proxy::*;

use std::path::PathBuf;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Manifest listing the subscription sources
pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/Shervinuri/SUBscripSHEN/refs/heads/main/SUBscripSHEN.json";

/// Where the rendered subscription is written
pub const DEFAULT_OUTPUT_PATH: &str = "index.html";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Manifest the sources are discovered from
    pub manifest_url: String,
    /// Output file for the subscription document
    pub output_path: PathBuf,
    pub aggregator: AggregatorConfig,
    pub document: SubscriptionDocument,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            aggregator: AggregatorConfig::default(),
            document: SubscriptionDocument::default(),
        }
    }
}
