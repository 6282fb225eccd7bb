//! Subscription aggregation pipeline
//!
//! This module provides functionality for:
//! - Discovering subscription sources listed in a manifest
//! - Fetching sources concurrently with per-request and total time limits
//! - Extracting VLESS links from plain or base64 bodies
//! - Deduplicating links across the whole run and tagging them by region

pub mod aggregator;
pub mod crawler;
pub mod dedup;
pub mod discovery;
pub mod geo;
pub mod models;
pub mod parser;

pub use aggregator::{AggregateError, Aggregator, AggregatorConfig};
pub use crawler::{CrawlResult, CrawlerConfig, FetchError, Fetcher};
pub use dedup::SeenKeys;
pub use discovery::{DiscoveryConfig, SourceDiscovery};
pub use geo::GeoTagger;
pub use models::{
    AggregationResult, GeoMarker, HostResolution, Link, MatchOutcome, SkipReason, SourceUrl,
    StopReason,
};
pub use parser::{DecodedBody, Extraction, LinkExtractor};
