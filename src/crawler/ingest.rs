//! Knowledge base ingestion workflows
//!
//! These tie a `WebCrawler` to a `DocumentStore`: crawl a site for the first
//! time, continue a previous crawl with the next batch of pages, or refresh
//! every page already stored.

use crate::crawler::{CrawlRequest, PageRecord, WebCrawler};
use crate::storage::{DocumentListing, DocumentStore, DocumentType};
use crate::{CrawlError, Result};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

const SOURCE_URL_KEY: &str = "source_url";
const MAX_DEPTH_KEY: &str = "max_depth";
const DEFAULT_MAX_DEPTH: u32 = 2;

/// Result of an ingestion workflow
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Pages written by this run
    pub pages_stored: usize,

    /// Full listing of the knowledge base after the write
    pub listing: DocumentListing,
}

fn crawl_metadata(source_url: &str, max_depth: u32, max_pages: usize) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert(SOURCE_URL_KEY.to_string(), source_url.to_string());
    metadata.insert("crawled_at".to_string(), Utc::now().to_rfc3339());
    metadata.insert(MAX_DEPTH_KEY.to_string(), max_depth.to_string());
    metadata.insert("max_pages".to_string(), max_pages.to_string());
    metadata
}

fn store_pages<S>(
    store: &mut S,
    knowledgebase_id: &str,
    pages: &[PageRecord],
    metadata: &BTreeMap<String, String>,
) -> Result<IngestReport>
where
    S: DocumentStore + ?Sized,
{
    if pages.is_empty() {
        return Err(CrawlError::NothingCrawled(knowledgebase_id.to_string()));
    }

    tracing::info!("Storing {} crawled pages", pages.len());
    let listing = store.store_crawled(knowledgebase_id, pages, metadata)?;
    Ok(IngestReport {
        pages_stored: pages.len(),
        listing,
    })
}

/// Crawls a site and stores the new pages in the knowledge base
///
/// The crawl parameters are recorded as knowledge base metadata so
/// `crawl_next` can continue from them.
pub async fn crawl_and_store<S>(
    crawler: &WebCrawler,
    store: &mut S,
    request: &CrawlRequest,
) -> Result<IngestReport>
where
    S: DocumentStore + ?Sized,
{
    tracing::info!("Starting crawl of {}", request.base_url);
    let pages = crawler.crawl(&*store, request).await?;

    let metadata = crawl_metadata(&request.base_url, request.max_depth, request.max_pages);
    store_pages(store, &request.knowledgebase_id, &pages, &metadata)
}

/// Crawls the next batch of pages from a knowledge base's recorded source
///
/// # Returns
///
/// * `Err(CrawlError::NoStoredPages)` - Nothing was crawled into the knowledge base yet
/// * `Err(CrawlError::MissingSourceUrl)` - The stored metadata has no source URL
pub async fn crawl_next<S>(
    crawler: &WebCrawler,
    store: &mut S,
    knowledgebase_id: &str,
    max_pages: usize,
) -> Result<IngestReport>
where
    S: DocumentStore + ?Sized,
{
    let listing = store
        .get_documents(knowledgebase_id, DocumentType::Crawled)?
        .ok_or_else(|| CrawlError::NoStoredPages(knowledgebase_id.to_string()))?;

    let source_url = listing
        .custom_metadata
        .get(SOURCE_URL_KEY)
        .filter(|u| !u.trim().is_empty())
        .cloned()
        .ok_or_else(|| CrawlError::MissingSourceUrl(knowledgebase_id.to_string()))?;

    let max_depth = listing
        .custom_metadata
        .get(MAX_DEPTH_KEY)
        .and_then(|d| d.parse().ok())
        .unwrap_or(DEFAULT_MAX_DEPTH);

    let request = CrawlRequest {
        base_url: source_url,
        knowledgebase_id: knowledgebase_id.to_string(),
        max_depth,
        max_pages,
    };

    tracing::info!(
        "Starting crawl of next {} pages from {}",
        max_pages,
        request.base_url
    );
    let pages = crawler.crawl(&*store, &request).await?;

    let metadata = crawl_metadata(&request.base_url, max_depth, max_pages);
    store_pages(store, knowledgebase_id, &pages, &metadata)
}

/// Re-extracts every stored page and overwrites its content in place
///
/// Each refreshed page keeps the filename it was stored under.
pub async fn recrawl_knowledgebase<S>(
    crawler: &WebCrawler,
    store: &mut S,
    knowledgebase_id: &str,
) -> Result<IngestReport>
where
    S: DocumentStore + ?Sized,
{
    let listing = store
        .get_documents(knowledgebase_id, DocumentType::Crawled)?
        .ok_or_else(|| CrawlError::NoStoredPages(knowledgebase_id.to_string()))?;

    let urls = listing.urls();
    if urls.is_empty() {
        return Err(CrawlError::NoStoredPages(knowledgebase_id.to_string()));
    }

    let filenames: HashMap<&str, &str> = listing
        .files
        .iter()
        .filter_map(|f| f.url.as_deref().map(|u| (u, f.filename.as_str())))
        .collect();

    tracing::info!("Starting recrawl of {} pages", urls.len());
    let mut pages = crawler.recrawl(&urls).await?;
    for page in &mut pages {
        if let Some(filename) = filenames.get(page.url.as_str()) {
            page.filename = filename.to_string();
        }
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("recrawled_at".to_string(), Utc::now().to_rfc3339());
    store_pages(store, knowledgebase_id, &pages, &metadata)
}
