//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up a site and a content-extraction
//! service and drive full crawl sessions against them.

mod common;

use common::{record, store_with, urls, Harness, KB};
use kb_crawler::crawler::{crawl_and_store, crawl_next};
use kb_crawler::storage::{DocumentStore, DocumentType, SqliteStorage};
use kb_crawler::{normalize_key, ConfigError, CrawlError, CrawlRequest, WebCrawler};
use std::collections::HashSet;
use std::time::{Duration, Instant};

fn request(h: &Harness, max_pages: usize) -> CrawlRequest {
    CrawlRequest {
        base_url: h.site.uri(),
        knowledgebase_id: KB.to_string(),
        max_depth: 2,
        max_pages,
    }
}

#[tokio::test]
async fn test_end_to_end_sitemap_order() {
    let h = Harness::start().await;
    h.page("/", "<html><body>Home</body></html>").await;
    h.sitemap("/sitemap.xml", &[(Some(1.0), "/a"), (Some(0.2), "/b")])
        .await;
    h.extraction_fails("/").await;
    h.extracts("/a", "Page A", "Text of A").await;
    h.extracts("/b", "Page B", "Text of B").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let store = store_with(&[]);
    let pages = crawler.crawl(&store, &request(&h, 2)).await.unwrap();

    assert_eq!(urls(&pages), vec![h.url("/a"), h.url("/b")]);
    assert_eq!(pages[0].filename, "a.html");
    assert_eq!(pages[1].filename, "b.html");
    assert_eq!(pages[0].content, "Text of A");
    assert_eq!(pages[0].metadata["title"], "Page A");
    assert_eq!(pages[1].metadata["url"], h.url("/b"));
}

#[tokio::test]
async fn test_sitemap_precedence_by_priority() {
    let h = Harness::start().await;
    // Declared out of priority order on purpose
    h.sitemap("/sitemap.xml", &[(Some(0.3), "/b"), (Some(0.9), "/a")])
        .await;
    h.extraction_fails("/").await;
    h.extracts("/a", "A", "alpha").await;
    h.extracts_times("/b", "beta", 0).await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 1))
        .await
        .unwrap();

    assert_eq!(urls(&pages), vec![h.url("/a")]);
}

#[tokio::test]
async fn test_root_is_fetched_first_when_new() {
    let h = Harness::start().await;
    h.page("/", "<html><body>Home</body></html>").await;
    h.sitemap("/sitemap.xml", &[(Some(1.0), "/a")]).await;
    h.extracts("/", "Home", "Welcome").await;
    h.extracts("/a", "A", "alpha").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 2))
        .await
        .unwrap();

    assert_eq!(urls(&pages), vec![h.root(), h.url("/a")]);
    assert_eq!(pages[0].filename, "index.html");
}

#[tokio::test]
async fn test_existing_pages_are_not_refetched() {
    let h = Harness::start().await;
    h.page_with_links("/", &["/x", "/y", "/z"]).await;
    h.page_with_links("/x", &["/w"]).await;
    h.extracts_times("/", "stale", 0).await;
    h.extracts_times("/x", "stale", 0).await;
    h.extracts("/y", "Y", "why").await;
    h.extracts("/z", "Z", "zed").await;
    h.extracts("/w", "W", "double-u").await;

    let store = store_with(&[
        record(&h.root(), "index.html", "home"),
        record(&h.url("/x"), "x.html", "x"),
    ]);
    let existing: HashSet<String> = [normalize_key(&h.root()), normalize_key(&h.url("/x"))]
        .into_iter()
        .collect();

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler.crawl(&store, &request(&h, 5)).await.unwrap();

    assert!(pages.len() <= 5);
    for page in &pages {
        assert!(
            !existing.contains(&normalize_key(&page.url)),
            "re-fetched stored page {}",
            page.url
        );
    }
    // Links out of stored pages were still followed
    assert_eq!(urls(&pages), vec![h.url("/w"), h.url("/y"), h.url("/z")]);
}

#[tokio::test]
async fn test_page_quota_is_respected() {
    let h = Harness::start().await;
    h.sitemap(
        "/sitemap.xml",
        &[
            (Some(0.9), "/p1"),
            (Some(0.8), "/p2"),
            (Some(0.7), "/p3"),
            (Some(0.6), "/p4"),
            (Some(0.5), "/p5"),
        ],
    )
    .await;
    h.extraction_fails("/").await;
    for p in ["/p1", "/p2", "/p3"] {
        h.extracts(p, p, "content").await;
    }
    h.extracts_times("/p4", "content", 0).await;
    h.extracts_times("/p5", "content", 0).await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 3))
        .await
        .unwrap();

    assert_eq!(
        urls(&pages),
        vec![h.url("/p1"), h.url("/p2"), h.url("/p3")]
    );
}

#[tokio::test]
async fn test_zero_quota_returns_nothing() {
    let h = Harness::start().await;
    let crawler = WebCrawler::new(h.config()).unwrap();

    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 0))
        .await
        .unwrap();

    assert!(pages.is_empty());
    let received = h.site.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_exhausted_sitemap_falls_back_to_discovery() {
    let h = Harness::start().await;
    h.sitemap("/sitemap.xml", &[(None, "/a"), (None, "/b")]).await;
    h.page_with_links("/", &["/c"]).await;
    h.page_with_links("/a", &["/d"]).await;
    h.extraction_fails("/").await;
    h.extracts_times("/a", "stale", 0).await;
    h.extracts_times("/b", "stale", 0).await;
    h.extracts("/c", "C", "sea").await;
    h.extracts("/d", "D", "dee").await;

    let store = store_with(&[
        record(&h.url("/a"), "a.html", "a"),
        record(&h.url("/b"), "b.html", "b"),
    ]);

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler.crawl(&store, &request(&h, 2)).await.unwrap();

    assert_eq!(urls(&pages), vec![h.url("/c"), h.url("/d")]);
}

#[tokio::test]
async fn test_discovery_runs_multiple_passes() {
    let h = Harness::start().await;
    h.page_with_links("/", &["/p1"]).await;
    h.page_with_links("/p1", &["/p2"]).await;
    h.page_with_links("/p2", &["/p3"]).await;
    h.page("/p3", "<html><body>end</body></html>").await;
    h.extraction_fails("/").await;
    for p in ["/p1", "/p2", "/p3"] {
        h.extracts(p, p, "content").await;
    }

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 3))
        .await
        .unwrap();

    assert_eq!(
        urls(&pages),
        vec![h.url("/p1"), h.url("/p2"), h.url("/p3")]
    );
}

#[tokio::test]
async fn test_frontier_exhaustion_returns_partial_result() {
    let h = Harness::start().await;
    h.page_with_links("/", &["/only", "https://elsewhere.example/page"]).await;
    h.extracts("/", "Home", "home").await;
    h.extracts("/only", "Only", "only page").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 10))
        .await
        .unwrap();

    assert_eq!(urls(&pages), vec![h.root(), h.url("/only")]);
}

#[tokio::test]
async fn test_crawls_are_deterministic() {
    let h = Harness::start().await;
    h.page_with_links("/", &["/zeta", "/alpha", "/mid", "/beta"]).await;
    h.page_with_links("/alpha", &["/gamma"]).await;
    for p in ["/", "/zeta", "/alpha", "/mid", "/beta", "/gamma"] {
        h.extracts(p, p, "content").await;
    }

    let crawler = WebCrawler::new(h.config()).unwrap();
    let first = crawler
        .crawl(&store_with(&[]), &request(&h, 4))
        .await
        .unwrap();
    let second = crawler
        .crawl(&store_with(&[]), &request(&h, 4))
        .await
        .unwrap();

    assert_eq!(urls(&first), urls(&second));
    assert_eq!(
        urls(&first),
        vec![h.root(), h.url("/alpha"), h.url("/beta"), h.url("/mid")]
    );
}

#[tokio::test]
async fn test_failed_root_is_retried_when_rediscovered() {
    let h = Harness::start().await;
    // A stored page links back to the root before the root is attempted
    h.page_with_links("/s", &["/"]).await;
    h.page("/", "<html><body>Home</body></html>").await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path(format!("/{}", h.root())))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&h.extractor)
        .await;
    h.extracts("/", "Home", "second time lucky").await;

    let store = store_with(&[record(&h.url("/s"), "s.html", "s")]);
    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler.crawl(&store, &request(&h, 1)).await.unwrap();

    assert_eq!(urls(&pages), vec![h.root()]);
    assert_eq!(pages[0].content, "second time lucky");
}

#[tokio::test]
async fn test_failed_sitemap_url_is_not_retried_in_discovery() {
    let h = Harness::start().await;
    h.sitemap("/sitemap.xml", &[(None, "/broken")]).await;
    h.page_with_links("/", &["/broken"]).await;
    h.extraction_fails("/").await;
    h.extraction_fails("/broken").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 3))
        .await
        .unwrap();
    assert!(pages.is_empty());

    let broken_attempts = h
        .extractor
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == format!("/{}", h.url("/broken")))
        .count();
    assert_eq!(broken_attempts, 1);
}

#[tokio::test]
async fn test_sitemap_index_is_expanded_and_cycles_ignored() {
    let h = Harness::start().await;
    let index = format!(
        r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
             <sitemap><loc>{}</loc></sitemap>
             <sitemap><loc>{}</loc></sitemap>
           </sitemapindex>"#,
        h.url("/sitemap-pages.xml"),
        h.url("/sitemap.xml")
    );
    h.xml("/sitemap.xml", &index).await;
    h.sitemap("/sitemap-pages.xml", &[(Some(0.4), "/a"), (Some(0.8), "/b")])
        .await;
    h.extraction_fails("/").await;
    h.extracts("/a", "A", "alpha").await;
    h.extracts("/b", "B", "beta").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 2))
        .await
        .unwrap();

    assert_eq!(urls(&pages), vec![h.url("/b"), h.url("/a")]);
}

#[tokio::test]
async fn test_malformed_sitemap_falls_back_to_links() {
    let h = Harness::start().await;
    h.xml("/sitemap.xml", "<urlset><url><loc>broken").await;
    h.page_with_links("/", &["/linked"]).await;
    h.extraction_fails("/").await;
    h.extracts("/linked", "Linked", "found by link").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 1))
        .await
        .unwrap();

    assert_eq!(urls(&pages), vec![h.url("/linked")]);
}

#[tokio::test]
async fn test_unreadable_storage_is_not_fatal() {
    let h = Harness::start().await;
    h.extracts("/", "Home", "home").await;

    // An empty knowledge base id makes every storage read fail
    let crawler = WebCrawler::new(h.config()).unwrap();
    let mut req = request(&h, 1);
    req.knowledgebase_id = String::new();

    let pages = crawler.crawl(&store_with(&[]), &req).await.unwrap();
    assert_eq!(urls(&pages), vec![h.root()]);
}

#[tokio::test]
async fn test_invalid_root_is_rejected() {
    let h = Harness::start().await;
    let crawler = WebCrawler::new(h.config()).unwrap();
    let mut req = request(&h, 1);
    req.base_url = "ftp://example.com/".to_string();

    let result = crawler.crawl(&store_with(&[]), &req).await;
    assert!(matches!(result, Err(CrawlError::Url(_))));
}

#[tokio::test]
async fn test_missing_credentials_fail_at_construction() {
    let h = Harness::start().await;
    let mut config = h.config();
    config.extraction.api_key = None;

    let result = WebCrawler::new(config);
    assert!(matches!(
        result,
        Err(CrawlError::Config(ConfigError::MissingCredentials(_)))
    ));
}

#[tokio::test]
async fn test_crawl_and_store_then_crawl_next() {
    let h = Harness::start().await;
    h.sitemap(
        "/sitemap.xml",
        &[(Some(0.9), "/a"), (Some(0.5), "/b"), (Some(0.1), "/c")],
    )
    .await;
    h.extraction_fails("/").await;
    h.extracts("/a", "A", "alpha").await;
    h.extracts("/b", "B", "beta").await;
    h.extracts("/c", "C", "gamma").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let mut store = SqliteStorage::open_in_memory().unwrap();

    let report = crawl_and_store(&crawler, &mut store, &request(&h, 1))
        .await
        .unwrap();
    assert_eq!(report.pages_stored, 1);
    assert_eq!(
        report.listing.custom_metadata["source_url"],
        h.site.uri()
    );
    assert_eq!(report.listing.custom_metadata["max_pages"], "1");

    let report = crawl_next(&crawler, &mut store, KB, 1).await.unwrap();
    assert_eq!(report.pages_stored, 1);

    let listing = store
        .get_documents(KB, DocumentType::Crawled)
        .unwrap()
        .unwrap();
    assert_eq!(listing.urls(), vec![h.url("/a"), h.url("/b")]);
    assert_eq!(
        store
            .get_document_content(KB, DocumentType::Crawled, "b.html")
            .unwrap()
            .as_deref(),
        Some("beta")
    );
}

#[tokio::test]
async fn test_crawl_next_requires_previous_crawl() {
    let h = Harness::start().await;
    let crawler = WebCrawler::new(h.config()).unwrap();
    let mut store = SqliteStorage::open_in_memory().unwrap();

    let result = crawl_next(&crawler, &mut store, KB, 5).await;
    assert!(matches!(result, Err(CrawlError::NoStoredPages(_))));

    // Pages stored without crawl metadata have no source to continue from
    let mut store = store_with(&[record(&h.url("/a"), "a.html", "a")]);
    let result = crawl_next(&crawler, &mut store, KB, 5).await;
    assert!(matches!(result, Err(CrawlError::MissingSourceUrl(_))));
}

#[tokio::test]
async fn test_crawl_and_store_with_no_content_is_an_error() {
    let h = Harness::start().await;
    h.extraction_fails("/").await;

    let crawler = WebCrawler::new(h.config()).unwrap();
    let mut store = SqliteStorage::open_in_memory().unwrap();

    let result = crawl_and_store(&crawler, &mut store, &request(&h, 3)).await;
    assert!(matches!(result, Err(CrawlError::NothingCrawled(_))));
    assert!(store
        .get_documents(KB, DocumentType::Crawled)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_pacing_follows_every_processed_url() {
    let h = Harness::start().await;
    h.page("/", "<html><body>Home</body></html>").await;
    h.sitemap("/sitemap.xml", &[(Some(0.9), "/a"), (Some(0.5), "/b")])
        .await;
    h.extraction_fails("/").await;
    h.extracts("/a", "A", "alpha").await;
    h.extraction_fails("/b").await;

    let mut config = h.config();
    config.crawler.pacing_delay_ms = 100;
    let crawler = WebCrawler::new(config).unwrap();

    let start = Instant::now();
    let pages = crawler
        .crawl(&store_with(&[]), &request(&h, 5))
        .await
        .unwrap();

    // Root and /b fail extraction, but each still waits out the delay
    assert_eq!(urls(&pages), vec![h.url("/a")]);
    assert!(start.elapsed() >= Duration::from_millis(300));
}
