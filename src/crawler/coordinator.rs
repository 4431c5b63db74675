//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives one crawl session through its phases:
//! - Loading the pages already stored for the knowledge base
//! - Following links out of stored pages without re-fetching them
//! - Fetching the root and sitemap URLs in priority order
//! - Fetching discovered URLs in lexicographic passes until the quota is met
//!
//! It also runs the recrawl loop over an explicit URL list.

use crate::crawler::fetcher::CrawlSession;
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::extract_links;
use crate::crawler::sitemap::{resolve_sitemap, sitemap_candidates};
use crate::crawler::PageRecord;
use crate::state::CrawlPhase;
use crate::storage::{DocumentListing, DocumentStore, DocumentType};
use crate::url::normalize_key;
use crate::{CrawlError, Result};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Main crawler coordinator structure
///
/// Owns the HTTP session for the lifetime of one crawl; dropping the
/// coordinator closes it.
pub struct Coordinator<'a> {
    session: CrawlSession<'a>,
    root: Url,
    root_key: String,
    max_pages: usize,
    max_sitemap_documents: usize,
    pacing: Duration,
    phase: CrawlPhase,
    frontier: Frontier,
    sitemap_keys: HashSet<String>,
    output: Vec<PageRecord>,
}

impl<'a> Coordinator<'a> {
    /// Creates a coordinator for one crawl of `root`
    pub fn new(
        session: CrawlSession<'a>,
        root: Url,
        max_pages: usize,
        max_sitemap_documents: usize,
        pacing: Duration,
    ) -> Self {
        let root_key = normalize_key(root.as_str());
        Self {
            session,
            root,
            root_key,
            max_pages,
            max_sitemap_documents,
            pacing,
            phase: CrawlPhase::Init,
            frontier: Frontier::default(),
            sitemap_keys: HashSet::new(),
            output: Vec::new(),
        }
    }

    /// Runs the session to completion and returns the new pages
    ///
    /// Per-URL failures are logged and skipped; a result shorter than
    /// `max_pages` is not an error.
    pub async fn run<S>(mut self, store: &S, knowledgebase_id: &str) -> Result<Vec<PageRecord>>
    where
        S: DocumentStore + ?Sized,
    {
        tracing::info!(
            "Starting crawl of {} for knowledge base {} (max {} pages)",
            self.root,
            knowledgebase_id,
            self.max_pages
        );

        // Init
        let listing = load_stored_listing(store, knowledgebase_id);
        let stored_urls = listing.urls();
        self.frontier = Frontier::new(listing.url_keys());

        self.advance(CrawlPhase::SeedLinks)?;
        let root_stored = self.seed_links(&stored_urls).await;

        self.advance(CrawlPhase::SitemapPhase)?;
        self.sitemap_phase(root_stored).await;

        if self.quota_met() {
            self.advance(CrawlPhase::Done)?;
        } else {
            self.advance(CrawlPhase::DiscoveryPhase)?;
            self.discovery_phase().await;
            self.advance(CrawlPhase::Done)?;
        }

        self.finish()
    }

    fn advance(&mut self, next: CrawlPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Crawl phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    fn quota_met(&self) -> bool {
        self.output.len() >= self.max_pages
    }

    /// Follows links out of every stored page; returns whether the root is stored
    async fn seed_links(&mut self, stored_urls: &[String]) -> bool {
        let mut seeded = HashSet::new();
        for url in stored_urls {
            if seeded.insert(normalize_key(url)) {
                self.discover_from(url).await;
            }
        }
        if !stored_urls.is_empty() {
            tracing::info!(
                "Found {} links from existing pages",
                self.frontier.discovered_len()
            );
        }

        let root_stored = self.frontier.is_existing(&self.root_key);
        if root_stored {
            tracing::info!(
                "Base URL {} already crawled, getting links only",
                self.root
            );
            if !seeded.contains(&self.root_key) {
                let root = self.root.to_string();
                self.discover_from(&root).await;
            }
        }
        root_stored
    }

    async fn sitemap_phase(&mut self, root_stored: bool) {
        let entries = resolve_sitemap(&self.session, &self.root, self.max_sitemap_documents).await;
        let candidates = sitemap_candidates(&entries, self.frontier.existing());
        self.sitemap_keys = candidates.iter().map(|u| normalize_key(u)).collect();

        let mut queue = Vec::with_capacity(candidates.len() + 1);
        let mut queued = HashSet::new();
        if !root_stored {
            queued.insert(self.root_key.clone());
            queue.push(self.root.to_string());
        }
        for url in candidates {
            if queued.insert(normalize_key(&url)) {
                queue.push(url);
            }
        }

        for url in queue {
            if self.quota_met() {
                break;
            }
            self.process_url(&url).await;
        }
    }

    async fn discovery_phase(&mut self) {
        while !self.quota_met() && self.frontier.has_discovered() {
            tracing::info!(
                "Need {} more pages, trying discovered URLs...",
                self.max_pages - self.output.len()
            );

            let batch = self.frontier.take_eligible(&self.sitemap_keys);
            if batch.is_empty() {
                tracing::info!("No new discovered URLs to crawl, all URLs have been crawled before");
                break;
            }

            for url in batch {
                if self.quota_met() {
                    break;
                }
                self.process_url(&url).await;
            }
        }
    }

    /// Handles one queued URL, then waits out the pacing delay
    async fn process_url(&mut self, url: &str) {
        self.visit(url).await;
        tokio::time::sleep(self.pacing).await;
    }

    async fn visit(&mut self, url: &str) {
        let key = normalize_key(url);
        if key.is_empty() {
            tracing::warn!("Skipping unparsable URL: {}", url);
            return;
        }

        if self.frontier.has_content(&key) {
            tracing::debug!("Content already stored for {}, following links only", url);
            self.discover_from(url).await;
        } else {
            self.frontier.mark_visited(&key);
            self.discover_from(url).await;

            match self.session.extract(url).await {
                Some(page) => match PageRecord::from_extraction(url, page) {
                    Some(record) => {
                        self.frontier.record_success(&key);
                        self.output.push(record);
                        tracing::info!(
                            "Successfully crawled URL ({}/{}): {}",
                            self.output.len(),
                            self.max_pages,
                            url
                        );
                    }
                    None => tracing::debug!("No content extracted from {}", url),
                },
                None => tracing::debug!("Extraction failed for {}", url),
            }
        }
    }

    async fn discover_from(&mut self, url: &str) {
        let page_url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!("Cannot follow links from {}: {}", url, e);
                return;
            }
        };

        if let Some(html) = self.session.fetch_html(url).await {
            let links = extract_links(&html, &page_url, &self.root, self.frontier.visited());
            let added = self.frontier.add_discovered(links);
            tracing::debug!("Discovered {} new links on {}", added, url);
        }
    }

    fn finish(self) -> Result<Vec<PageRecord>> {
        if self.output.len() < self.max_pages {
            tracing::warn!(
                "Could only find {} new unique pages out of {} requested. Tried {} URLs (sitemap: {}, discovered: {})",
                self.output.len(),
                self.max_pages,
                self.frontier.visited().len(),
                self.sitemap_keys.len(),
                self.frontier.discovered_len()
            );
        } else {
            tracing::info!(
                "Successfully found all {} new unique pages. Used {} sitemap URLs and {} discovered URLs.",
                self.max_pages,
                self.sitemap_keys.len(),
                self.frontier.discovered_len()
            );
        }
        Ok(self.output)
    }
}

/// Reads the stored listing of a knowledge base; failures yield an empty one
fn load_stored_listing<S>(store: &S, knowledgebase_id: &str) -> DocumentListing
where
    S: DocumentStore + ?Sized,
{
    match store.get_documents(knowledgebase_id, DocumentType::Crawled) {
        Ok(Some(listing)) => {
            tracing::info!("Found {} already crawled URLs", listing.urls().len());
            listing
        }
        Ok(None) => DocumentListing::default(),
        Err(e) => {
            tracing::warn!("Could not fetch existing URLs: {}", e);
            DocumentListing::default()
        }
    }
}

/// Re-extracts every URL in order, without discovery
///
/// The pacing delay follows every entry of the list, whatever its outcome.
pub async fn recrawl_urls(
    session: &CrawlSession<'_>,
    urls: &[String],
    pacing: Duration,
) -> Vec<PageRecord> {
    let mut pages = Vec::new();

    for url in urls {
        if let Some(record) = recrawl_one(session, url).await {
            pages.push(record);
        }
        tokio::time::sleep(pacing).await;
    }

    tracing::info!("Recrawled {} of {} URLs", pages.len(), urls.len());
    pages
}

async fn recrawl_one(session: &CrawlSession<'_>, url: &str) -> Option<PageRecord> {
    if let Err(e) = Url::parse(url) {
        tracing::warn!("Skipping unparsable recrawl URL {}: {}", url, e);
        return None;
    }

    match session.extract(url).await {
        Some(page) => match PageRecord::from_extraction(url, page) {
            Some(record) => {
                tracing::info!("Recrawled {}", url);
                Some(record)
            }
            None => {
                tracing::warn!("No content returned when recrawling {}", url);
                None
            }
        },
        None => {
            tracing::warn!("Failed to recrawl {}", url);
            None
        }
    }
}
