//! Shared fixtures for the integration tests
//!
//! Every test runs two mock servers: the site being crawled and the
//! content-extraction service. Extraction requests arrive as
//! `GET /<target-url>`, so mocks match on the full target URL.

#![allow(dead_code)]

use kb_crawler::config::{
    Config, CrawlerConfig, ExtractionConfig, StorageConfig, UserAgentConfig,
};
use kb_crawler::storage::{DocumentStore, SqliteStorage};
use kb_crawler::PageRecord;
use std::collections::BTreeMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-key";
pub const KB: &str = "kb-test";

pub struct Harness {
    pub site: MockServer,
    pub extractor: MockServer,
}

impl Harness {
    pub async fn start() -> Self {
        Self {
            site: MockServer::start().await,
            extractor: MockServer::start().await,
        }
    }

    /// Absolute URL of a path on the mock site
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.site.uri(), path)
    }

    /// Root URL as the crawler reports it (with trailing slash)
    pub fn root(&self) -> String {
        self.url("/")
    }

    pub fn config(&self) -> Config {
        Config {
            crawler: CrawlerConfig {
                max_pages: 10,
                max_depth: 2,
                pacing_delay_ms: 0,
                request_timeout_secs: 5,
                max_sitemap_documents: 10,
            },
            extraction: ExtractionConfig {
                endpoint: format!("{}/", self.extractor.uri()),
                api_key_env: "KB_CRAWLER_IT_UNSET_API_KEY".to_string(),
                api_key: Some(API_KEY.to_string()),
                calls_per_window: 1000,
                window_secs: 60,
            },
            user_agent: UserAgentConfig::default(),
            storage: StorageConfig {
                database_path: ":memory:".to_string(),
            },
        }
    }

    /// Serves an HTML page on the site
    pub async fn page(&self, path_str: &str, html: &str) {
        Mock::given(method("GET"))
            .and(path(path_str))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html)
                    .insert_header("content-type", "text/html"),
            )
            .mount(&self.site)
            .await;
    }

    /// Serves an HTML page linking to each of `links`
    pub async fn page_with_links(&self, path_str: &str, links: &[&str]) {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{}">{}</a>"#, l, l))
            .collect();
        self.page(path_str, &format!("<html><body>{}</body></html>", anchors))
            .await;
    }

    /// Serves `/sitemap.xml` (or any path) as a urlset of `(priority, path)` pairs
    pub async fn sitemap(&self, path_str: &str, entries: &[(Option<f64>, &str)]) {
        let urls: String = entries
            .iter()
            .map(|(priority, p)| match priority {
                Some(pr) => format!(
                    "<url><loc>{}</loc><priority>{}</priority></url>",
                    self.url(p),
                    pr
                ),
                None => format!("<url><loc>{}</loc></url>", self.url(p)),
            })
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            urls
        );
        self.xml(path_str, &xml).await;
    }

    pub async fn xml(&self, path_str: &str, xml: &str) {
        Mock::given(method("GET"))
            .and(path(path_str))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(xml)
                    .insert_header("content-type", "application/xml"),
            )
            .mount(&self.site)
            .await;
    }

    fn extraction_mock(&self, target: &str, body: &str) -> Mock {
        Mock::given(method("GET"))
            .and(path(format!("/{}", target)))
            .and(header("Authorization", format!("Bearer {}", API_KEY).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
    }

    /// Makes the extraction service return text for a site path
    pub async fn extracts(&self, path_str: &str, title: &str, text: &str) {
        let body = format!("Title: {}\n\n{}\n", title, text);
        self.extraction_mock(&self.url(path_str), &body)
            .mount(&self.extractor)
            .await;
    }

    /// Like `extracts`, but the mock must be hit exactly `times` times
    pub async fn extracts_times(&self, path_str: &str, text: &str, times: u64) {
        self.extraction_mock(&self.url(path_str), &format!("Title: t\n{}", text))
            .expect(times)
            .named(format!("extraction of {}", path_str))
            .mount(&self.extractor)
            .await;
    }

    /// Makes the extraction service fail for a site path
    pub async fn extraction_fails(&self, path_str: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", self.url(path_str))))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.extractor)
            .await;
    }
}

pub fn record(url: &str, filename: &str, content: &str) -> PageRecord {
    let mut metadata = BTreeMap::new();
    metadata.insert("url".to_string(), url.to_string());
    PageRecord {
        content: content.to_string(),
        metadata,
        filename: filename.to_string(),
        url: url.to_string(),
    }
}

/// In-memory store pre-populated with pages for `KB`
pub fn store_with(pages: &[PageRecord]) -> SqliteStorage {
    let mut storage = SqliteStorage::open_in_memory().expect("in-memory database");
    if !pages.is_empty() {
        storage
            .store_crawled(KB, pages, &BTreeMap::new())
            .expect("seed pages");
    }
    storage
}

pub fn urls(pages: &[PageRecord]) -> Vec<String> {
    pages.iter().map(|p| p.url.clone()).collect()
}
