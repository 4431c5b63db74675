//! Crawler module for incremental knowledge base ingestion
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching for link discovery and content extraction
//! - Sliding-window rate limiting of the extraction service
//! - Sitemap resolution and link extraction
//! - Frontier bookkeeping and overall crawl coordination
//! - Workflows that persist crawl results into a knowledge base

mod coordinator;
mod fetcher;
mod frontier;
mod ingest;
mod parser;
mod rate_limit;
mod sitemap;

pub use coordinator::Coordinator;
pub use fetcher::{
    build_http_client, parse_extraction_response, CrawlSession, ExtractedPage, ExtractionEndpoint,
};
pub use frontier::Frontier;
pub use ingest::{crawl_and_store, crawl_next, recrawl_knowledgebase, IngestReport};
pub use parser::extract_links;
pub use rate_limit::SlidingWindowLimiter;
pub use sitemap::{
    parse_sitemap, resolve_sitemap, sitemap_candidates, SitemapEntry, SitemapError, SitemapItem,
    DEFAULT_PRIORITY,
};

use crate::config::{resolve_api_key, Config, CrawlerConfig};
use crate::storage::DocumentStore;
use crate::url::{filename_for_url, parse_http_url};
use crate::{CrawlError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One crawled page, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Extracted page text
    pub content: String,

    /// `url`, `crawled_at` and, when known, `title`
    pub metadata: BTreeMap<String, String>,

    /// Storage filename derived from the URL path
    pub filename: String,

    pub url: String,
}

impl PageRecord {
    /// Builds a record from an extraction result
    ///
    /// Returns `None` for empty text or an unparsable URL.
    pub fn from_extraction(url: &str, page: ExtractedPage) -> Option<Self> {
        if page.text.trim().is_empty() {
            return None;
        }
        let parsed = Url::parse(url).ok()?;

        let mut metadata = BTreeMap::new();
        metadata.insert("url".to_string(), url.to_string());
        metadata.insert("crawled_at".to_string(), Utc::now().to_rfc3339());
        if let Some(title) = page.title {
            metadata.insert("title".to_string(), title);
        }

        Some(Self {
            content: page.text,
            metadata,
            filename: filename_for_url(&parsed),
            url: url.to_string(),
        })
    }
}

/// Parameters of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// Crawl root; also defines the only host links are followed on
    pub base_url: String,

    pub knowledgebase_id: String,

    /// Recorded with the knowledge base; the crawl itself is bounded by `max_pages`
    pub max_depth: u32,

    /// Number of new pages to return at most
    pub max_pages: usize,
}

impl CrawlRequest {
    /// Creates a request using the configured page and depth limits
    pub fn new(base_url: &str, knowledgebase_id: &str, config: &CrawlerConfig) -> Self {
        Self {
            base_url: base_url.to_string(),
            knowledgebase_id: knowledgebase_id.to_string(),
            max_depth: config.max_depth,
            max_pages: config.max_pages,
        }
    }
}

/// Entry point for crawls and recrawls
///
/// The extraction rate limiter is owned here: every session started from
/// this crawler, or from a clone of it, draws from the same call budget.
/// Separately constructed crawlers have independent budgets.
#[derive(Clone)]
pub struct WebCrawler {
    config: Arc<Config>,
    extraction: Arc<ExtractionEndpoint>,
    limiter: Arc<SlidingWindowLimiter>,
}

impl WebCrawler {
    /// Creates a crawler, resolving the extraction service credentials
    ///
    /// # Returns
    ///
    /// * `Ok(WebCrawler)` - Ready to crawl
    /// * `Err(CrawlError::Config)` - No API key is configured
    pub fn new(config: Config) -> Result<Self> {
        let api_key = resolve_api_key(&config.extraction)?;

        let extraction = ExtractionEndpoint {
            endpoint: config.extraction.endpoint.clone(),
            api_key,
        };
        let limiter = SlidingWindowLimiter::new(
            config.extraction.calls_per_window,
            Duration::from_secs(config.extraction.window_secs),
        );

        Ok(Self {
            config: Arc::new(config),
            extraction: Arc::new(extraction),
            limiter: Arc::new(limiter),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn open_session(&self) -> Result<CrawlSession<'_>> {
        let session = CrawlSession::open(
            &self.config.user_agent,
            Duration::from_secs(self.config.crawler.request_timeout_secs),
            &self.extraction,
            &self.limiter,
        )?;
        Ok(session)
    }

    fn pacing(&self) -> Duration {
        Duration::from_millis(self.config.crawler.pacing_delay_ms)
    }

    /// Crawls up to `request.max_pages` pages not yet stored in the knowledge base
    ///
    /// `store` is only read, to learn which URLs are already stored; persisting
    /// the returned records is up to the caller.
    pub async fn crawl<S>(&self, store: &S, request: &CrawlRequest) -> Result<Vec<PageRecord>>
    where
        S: DocumentStore + ?Sized,
    {
        let root = parse_http_url(&request.base_url)?;

        if request.max_pages == 0 {
            tracing::info!("max_pages is 0, nothing to crawl");
            return Ok(Vec::new());
        }

        let session = self.open_session()?;
        let coordinator = Coordinator::new(
            session,
            root,
            request.max_pages,
            self.config.crawler.max_sitemap_documents,
            self.pacing(),
        );
        coordinator.run(store, &request.knowledgebase_id).await
    }

    /// Re-extracts exactly the given URLs, in order, with no discovery
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<PageRecord>)` - Records for every URL that yielded content
    /// * `Err(CrawlError::EmptyRecrawlList)` - `urls` is empty
    pub async fn recrawl(&self, urls: &[String]) -> Result<Vec<PageRecord>> {
        if urls.is_empty() {
            return Err(CrawlError::EmptyRecrawlList);
        }

        let session = self.open_session()?;
        Ok(coordinator::recrawl_urls(&session, urls, self.pacing()).await)
    }
}
