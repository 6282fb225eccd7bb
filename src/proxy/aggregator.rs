//! Aggregation pipeline: discovery, bounded fan-out, global dedup and cap

use crate::proxy::crawler::{CrawlResult, CrawlerConfig, Fetcher};
use crate::proxy::dedup::SeenKeys;
use crate::proxy::discovery::{DiscoveryConfig, SourceDiscovery};
use crate::proxy::geo::GeoTagger;
use crate::proxy::models::{AggregationResult, SourceUrl, StopReason};
use crate::proxy::parser::{LinkExtractor, DEFAULT_LABEL_TAG};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Default number of concurrent source fetches
const DEFAULT_CONCURRENCY: usize = 5;

/// Default wall-clock budget for the whole fan-out in seconds
const DEFAULT_BUDGET_SECS: u64 = 60;

/// Default cap on aggregated links
const DEFAULT_MAX_LINKS: usize = 150;

/// Terminal outcomes of a run that produce no output
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("No source URLs found")]
    NoSources,
    #[error("No configs found")]
    NoConfigs,
}

/// Configuration for an aggregation run
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Number of sources fetched at once
    pub concurrency: usize,
    /// Time budget for the fan-out stage
    pub budget: Duration,
    /// Maximum number of links in the result
    pub max_links: usize,
    /// Product tag placed in every link label
    pub label_tag: String,
    pub crawler: CrawlerConfig,
    pub discovery: DiscoveryConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            budget: Duration::from_secs(DEFAULT_BUDGET_SECS),
            max_links: DEFAULT_MAX_LINKS,
            label_tag: DEFAULT_LABEL_TAG.to_string(),
            crawler: CrawlerConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links;
        self
    }

    pub fn with_label_tag(mut self, tag: String) -> Self {
        self.label_tag = tag;
        self
    }

    pub fn with_crawler(mut self, crawler: CrawlerConfig) -> Self {
        self.crawler = crawler;
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }
}

/// Runs aggregations over the sources listed in a manifest
///
/// Every call to [`Aggregator::aggregate`] builds a fresh geo cache and
/// seen-key set, handed to its fetch tasks only through their synchronized
/// handles. Runs never see each other's links.
pub struct Aggregator {
    config: AggregatorConfig,
    fetcher: Fetcher,
    discovery: SourceDiscovery,
}

impl Aggregator {
    pub fn new() -> Result<Self> {
        Self::with_config(AggregatorConfig::default())
    }

    pub fn with_config(config: AggregatorConfig) -> Result<Self> {
        let fetcher = Fetcher::with_config(config.crawler.clone())?;
        let discovery = SourceDiscovery::new(fetcher.clone(), config.discovery.clone());

        Ok(Self {
            config,
            fetcher,
            discovery,
        })
    }

    /// Discover sources from `manifest_url` and aggregate their links
    pub async fn run(
        &self,
        manifest_url: &str,
    ) -> std::result::Result<AggregationResult, AggregateError> {
        let sources = self.discovery.discover(manifest_url).await;
        if sources.is_empty() {
            return Err(AggregateError::NoSources);
        }

        let result = self.aggregate(sources).await;
        if result.is_empty() {
            return Err(AggregateError::NoConfigs);
        }

        Ok(result)
    }

    /// Fetch `sources` concurrently and merge their links in completion order.
    ///
    /// At most `concurrency` fetches run at once. Merging stops when the link
    /// cap is reached or the budget elapses; sources not yet started are
    /// never fetched, and fetches already running finish in the background
    /// with their links discarded.
    pub async fn aggregate(&self, sources: Vec<SourceUrl>) -> AggregationResult {
        let deadline = Instant::now() + self.config.budget;
        let max_links = self.config.max_links;
        let mut result = AggregationResult::default();
        let extractor = LinkExtractor::new(
            GeoTagger::new(),
            SeenKeys::new(),
            self.config.label_tag.clone(),
        );

        let mut results = stream::iter(sources)
            .map(|source| {
                let fetcher = self.fetcher.clone();
                let extractor = extractor.clone();
                // Dropping the stream detaches spawned fetches; it never aborts them.
                tokio::spawn(async move { fetcher.fetch_source(&source, &extractor).await })
            })
            .buffer_unordered(self.config.concurrency.max(1));

        loop {
            let crawl: CrawlResult = match tokio::time::timeout_at(deadline, results.next()).await {
                Ok(Some(Ok(crawl))) => crawl,
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Fetch task failed");
                    continue;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        budget_secs = self.config.budget.as_secs_f64(),
                        collected = result.len(),
                        "Fetch budget elapsed, continuing with collected links"
                    );
                    result.stop_reason = StopReason::BudgetElapsed;
                    break;
                }
            };

            result.sources_attempted += 1;
            if !crawl.links.is_empty() {
                result.sources_contributed += 1;
            }

            let room = max_links.saturating_sub(result.len());
            result.links.extend(crawl.links.into_iter().take(room));

            if result.len() >= max_links {
                tracing::info!(max = max_links, "Link cap reached, ignoring remaining sources");
                result.stop_reason = StopReason::CapReached;
                break;
            }
        }

        tracing::info!(
            links = result.len(),
            attempted = result.sources_attempted,
            contributed = result.sources_contributed,
            "Aggregation finished"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregator_config_default() {
        let config = AggregatorConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.budget, Duration::from_secs(60));
        assert_eq!(config.max_links, 150);
        assert_eq!(config.label_tag, "SHΞN™");
        assert_eq!(config.crawler.timeout, Duration::from_secs(10));
        assert_eq!(config.discovery.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_aggregator_config_builder() {
        let config = AggregatorConfig::new()
            .with_concurrency(2)
            .with_budget(Duration::from_secs(5))
            .with_max_links(10)
            .with_label_tag("Tag".to_string());

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.budget, Duration::from_secs(5));
        assert_eq!(config.max_links, 10);
        assert_eq!(config.label_tag, "Tag");
    }

    #[tokio::test]
    async fn test_aggregate_without_sources_is_empty() {
        let aggregator = Aggregator::new().unwrap();
        let result = aggregator.aggregate(Vec::new()).await;
        assert!(result.is_empty());
        assert_eq!(result.stop_reason, StopReason::Exhausted);
    }
}
