//! HTTP fetching of subscription sources
//!
//! Every request carries a browser-like user agent and is bounded by a
//! timeout. Failures never leave this module as errors of the run: a source
//! that cannot be fetched simply contributes no links.

use crate::proxy::models::{Link, SourceUrl};
use crate::proxy::parser::LinkExtractor;
use crate::Result;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Default timeout for a subscription fetch in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent for HTTP requests
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Errors from fetching a single URL
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or body read failure
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Any response other than 200 OK
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of fetching a single source
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// The source that was fetched
    pub source: SourceUrl,
    /// New links extracted from the source
    pub links: Vec<Link>,
    /// Error message if fetching failed
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn success(source: SourceUrl, links: Vec<Link>) -> Self {
        Self {
            source,
            links,
            error: None,
        }
    }

    pub fn failure(source: SourceUrl, error: String) -> Self {
        Self {
            source,
            links: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for source fetching
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for each subscription request
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Fetcher for subscription sources
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    config: CrawlerConfig,
    client: Client,
}

impl Fetcher {
    /// Create a new fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new fetcher with custom configuration
    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;

        Ok(Self { config, client })
    }

    /// GET `url` and return its body, bounded by `timeout`
    pub async fn fetch_text(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<String, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            if response.status() != StatusCode::OK {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }
            Ok::<_, FetchError>(response.text().await?)
        };

        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }

    /// Fetch a subscription and extract its new links.
    ///
    /// Any failure is logged and yields an empty list.
    pub async fn fetch(&self, url: &str, extractor: &LinkExtractor) -> Vec<Link> {
        self.fetch_source(&SourceUrl::new(url), extractor)
            .await
            .links
    }

    /// Fetch a subscription, keeping the failure reason
    pub async fn fetch_source(&self, source: &SourceUrl, extractor: &LinkExtractor) -> CrawlResult {
        match self.fetch_text(source.as_str(), self.config.timeout).await {
            Ok(body) => {
                let links = extractor.extract(&body);
                tracing::info!(url = %source, count = links.len(), "Fetched subscription");
                CrawlResult::success(source.clone(), links)
            }
            Err(e) => {
                tracing::warn!(url = %source, error = %e, "Failed to fetch subscription");
                CrawlResult::failure(source.clone(), e.to_string())
            }
        }
    }
}
