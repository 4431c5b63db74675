//! Sitemap discovery and prioritization
//!
//! This module handles:
//! - Parsing `urlset` and `sitemapindex` documents
//! - Expanding nested sitemaps depth-first into one flat entry list
//! - Filtering entries against stored pages and ordering them by priority
//!
//! Every failure while resolving a sitemap is logged and treated as an empty
//! document, so a broken sitemap only ever means "fall back to link discovery".

use crate::crawler::fetcher::CrawlSession;
use crate::url::normalize_key;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Priority assumed when an entry declares none
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// A page URL declared by a sitemap
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Declared priority, within [0.0, 1.0]
    pub priority: f64,
    pub url: String,
}

/// One `<url>` or `<sitemap>` element of a sitemap document
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapItem {
    pub loc: String,
    pub priority: Option<f64>,
    /// True for `<sitemap>` children of a sitemap index
    pub from_index: bool,
}

/// Errors raised while parsing a sitemap document
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unexpected root element: {0}")]
    UnexpectedRoot(String),

    #[error("Document has no root element")]
    MissingRoot,
}

#[derive(Clone, Copy)]
enum Field {
    Loc,
    Priority,
}

#[derive(Default)]
struct ItemBuilder {
    loc: String,
    priority: String,
    from_index: bool,
}

/// Parses a sitemap document into its items, in document order
///
/// Elements are matched by local name, so both the default sitemap namespace
/// and prefixed forms are accepted. The root must be `urlset` or
/// `sitemapindex`. Priority text that is not a finite number is ignored;
/// numeric priorities are clamped to [0.0, 1.0].
pub fn parse_sitemap(xml: &str) -> Result<Vec<SitemapItem>, SitemapError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut items = Vec::new();
    let mut root_seen = false;
    let mut depth = 0usize;
    let mut current: Option<ItemBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                if !root_seen {
                    check_root(name.as_ref())?;
                    root_seen = true;
                    continue;
                }
                match (depth, name.as_ref()) {
                    (2, b"url") => current = Some(ItemBuilder::default()),
                    (2, b"sitemap") => {
                        current = Some(ItemBuilder {
                            from_index: true,
                            ..ItemBuilder::default()
                        })
                    }
                    (3, b"loc") if current.is_some() => field = Some(Field::Loc),
                    (3, b"priority") if current.is_some() => field = Some(Field::Priority),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if !root_seen {
                    check_root(e.local_name().as_ref())?;
                    root_seen = true;
                }
            }
            Event::Text(t) => {
                if let (Some(f), Some(item)) = (field, current.as_mut()) {
                    let text = t.unescape()?;
                    match f {
                        Field::Loc => item.loc.push_str(&text),
                        Field::Priority => item.priority.push_str(&text),
                    }
                }
            }
            Event::CData(c) => {
                if let (Some(f), Some(item)) = (field, current.as_mut()) {
                    let raw = c.into_inner();
                    let text = String::from_utf8_lossy(&raw);
                    match f {
                        Field::Loc => item.loc.push_str(&text),
                        Field::Priority => item.priority.push_str(&text),
                    }
                }
            }
            Event::End(e) => {
                match (depth, e.local_name().as_ref()) {
                    (3, b"loc") | (3, b"priority") => field = None,
                    (2, b"url") | (2, b"sitemap") => {
                        if let Some(item) = current.take() {
                            let loc = item.loc.trim();
                            if !loc.is_empty() {
                                items.push(SitemapItem {
                                    loc: loc.to_string(),
                                    priority: parse_priority(&item.priority),
                                    from_index: item.from_index,
                                });
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(SitemapError::MissingRoot);
    }

    Ok(items)
}

fn check_root(name: &[u8]) -> Result<(), SitemapError> {
    match name {
        b"urlset" | b"sitemapindex" => Ok(()),
        other => Err(SitemapError::UnexpectedRoot(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn parse_priority(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    if value.is_finite() {
        Some(value.clamp(0.0, 1.0))
    } else {
        None
    }
}

fn is_nested_sitemap(item: &SitemapItem, url: &Url) -> bool {
    item.from_index || url.path().to_ascii_lowercase().ends_with(".xml")
}

enum Work {
    Fetch(String),
    Emit(SitemapEntry),
}

/// Fetches `<root>/sitemap.xml` and flattens it into page entries
///
/// Nested sitemaps are expanded depth-first, in place, so the result follows
/// document order across the whole tree. At most `max_documents` sitemap
/// documents are fetched and each is fetched at most once.
pub async fn resolve_sitemap(
    session: &CrawlSession<'_>,
    root: &Url,
    max_documents: usize,
) -> Vec<SitemapEntry> {
    let sitemap_url = match root.join("/sitemap.xml") {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build sitemap URL for {}: {}", root, e);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    let mut fetched: HashSet<String> = HashSet::new();
    let mut stack = vec![Work::Fetch(sitemap_url.to_string())];

    while let Some(work) = stack.pop() {
        let document_url = match work {
            Work::Emit(entry) => {
                entries.push(entry);
                continue;
            }
            Work::Fetch(url) => url,
        };

        if !fetched.insert(normalize_key(&document_url)) {
            tracing::debug!("Sitemap {} already processed, skipping", document_url);
            continue;
        }
        if fetched.len() > max_documents {
            tracing::warn!(
                "Sitemap document limit ({}) reached, skipping {}",
                max_documents,
                document_url
            );
            continue;
        }

        let items = match fetch_document(session, &document_url).await {
            Some(items) => items,
            None => continue,
        };

        let base = match Url::parse(&document_url) {
            Ok(url) => url,
            Err(_) => continue,
        };

        let mut work: Vec<Work> = Vec::with_capacity(items.len());
        for item in items {
            let url = match base.join(&item.loc) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping sitemap location {}: {}", item.loc, e);
                    continue;
                }
            };
            if is_nested_sitemap(&item, &url) {
                work.push(Work::Fetch(url.to_string()));
            } else {
                work.push(Work::Emit(SitemapEntry {
                    priority: item.priority.unwrap_or(DEFAULT_PRIORITY),
                    url: url.to_string(),
                }));
            }
        }
        stack.extend(work.into_iter().rev());
    }

    tracing::debug!("Sitemap resolved to {} entries", entries.len());
    entries
}

async fn fetch_document(session: &CrawlSession<'_>, url: &str) -> Option<Vec<SitemapItem>> {
    let body = session.fetch_html(url).await?;
    match parse_sitemap(&body) {
        Ok(items) => Some(items),
        Err(e) => {
            tracing::warn!("Error processing sitemap {}: {}", url, e);
            None
        }
    }
}

/// Orders sitemap entries into the URLs the crawl should attempt
///
/// When the sitemap declares no more URLs than are already stored, it is
/// considered exhausted and nothing is returned. Otherwise entries are sorted
/// by descending priority (stable, so ties keep sitemap order), entries whose
/// key is stored or already listed are dropped, and the remaining URLs are
/// returned.
pub fn sitemap_candidates(entries: &[SitemapEntry], existing: &HashSet<String>) -> Vec<String> {
    if !entries.is_empty() && existing.len() >= entries.len() {
        tracing::info!("All sitemap URLs have been crawled, falling back to discovered URLs");
        return Vec::new();
    }

    let mut sorted: Vec<&SitemapEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.priority.total_cmp(&a.priority));

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for entry in sorted {
        let key = normalize_key(&entry.url);
        if key.is_empty() || existing.contains(&key) || !seen.insert(key) {
            continue;
        }
        candidates.push(entry.url.clone());
    }

    if candidates.is_empty() {
        tracing::info!("No new sitemap URLs available, falling back to discovered URLs");
    } else {
        tracing::info!(
            "Found {} new URLs from sitemap, sorted by priority",
            candidates.len()
        );
    }

    candidates
}
