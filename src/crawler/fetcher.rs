//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building HTTP clients with the configured user agent and timeout
//! - Plain GET requests used for link discovery
//! - Rate-limited calls to the content-extraction service
//! - The per-crawl session that owns the client

use crate::config::UserAgentConfig;
use crate::crawler::rate_limit::SlidingWindowLimiter;
use reqwest::{header::AUTHORIZATION, redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Page text returned by the content-extraction service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Title line, when the service reported one
    pub title: Option<String>,

    /// Extracted body text, trimmed
    pub text: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use kb_crawler::config::UserAgentConfig;
/// use kb_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Splits an extraction-service response into title and text
///
/// A first line starting with `Title:` is taken as the title; everything
/// after it, trimmed, is the text. Without a title line the whole body is text.
///
/// # Example
///
/// ```
/// use kb_crawler::crawler::parse_extraction_response;
///
/// let page = parse_extraction_response("Title: Home\n\nWelcome!\n");
/// assert_eq!(page.title.as_deref(), Some("Home"));
/// assert_eq!(page.text, "Welcome!");
/// ```
pub fn parse_extraction_response(body: &str) -> ExtractedPage {
    let (first, rest) = match body.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (body, ""),
    };

    match first.strip_prefix("Title:") {
        Some(title) => {
            let title = title.trim();
            ExtractedPage {
                title: (!title.is_empty()).then(|| title.to_string()),
                text: rest.trim().to_string(),
            }
        }
        None => ExtractedPage {
            title: None,
            text: body.trim().to_string(),
        },
    }
}

/// Connection settings for the content-extraction service
#[derive(Debug, Clone)]
pub struct ExtractionEndpoint {
    /// Prefix the target URL is appended to
    pub endpoint: String,

    /// Bearer token
    pub api_key: String,
}

impl ExtractionEndpoint {
    fn request_url(&self, target: &str) -> String {
        format!("{}{}", self.endpoint, target)
    }
}

/// HTTP session scoped to one crawl or recrawl
///
/// The client and its connection pool live exactly as long as this value;
/// dropping it on any exit path closes every socket.
pub struct CrawlSession<'a> {
    client: Client,
    extraction: &'a ExtractionEndpoint,
    limiter: &'a SlidingWindowLimiter,
}

impl<'a> CrawlSession<'a> {
    /// Opens a session with a fresh HTTP client
    pub fn open(
        user_agent: &UserAgentConfig,
        timeout: Duration,
        extraction: &'a ExtractionEndpoint,
        limiter: &'a SlidingWindowLimiter,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, timeout)?;
        tracing::debug!("Opened crawl session");
        Ok(Self {
            client,
            extraction,
            limiter,
        })
    }

    /// Fetches a page body for link discovery
    ///
    /// Returns `None` on any non-200 status or transport error.
    pub async fn fetch_html(&self, url: &str) -> Option<String> {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status != StatusCode::OK {
                    tracing::debug!("Link fetch of {} returned {}", url, status);
                    return None;
                }
                match response.text().await {
                    Ok(body) => Some(body),
                    Err(e) => {
                        tracing::error!("Error reading body of {}: {}", url, e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::error!("Error fetching links from {}: {}", url, classify_error(&e));
                None
            }
        }
    }

    /// Fetches extracted page text through the content-extraction service
    ///
    /// Waits for a rate-limiter slot first. Returns `None` on any non-200
    /// status or transport error.
    pub async fn extract(&self, url: &str) -> Option<ExtractedPage> {
        self.limiter.wait_for_slot().await;

        let response = self
            .client
            .get(self.extraction.request_url(url))
            .header(AUTHORIZATION, format!("Bearer {}", self.extraction.api_key))
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status != StatusCode::OK {
                    tracing::warn!("Failed to extract {}, status: {}", url, status);
                    return None;
                }
                match response.text().await {
                    Ok(body) => Some(parse_extraction_response(&body)),
                    Err(e) => {
                        tracing::error!("Error reading extraction for {}: {}", url, e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::error!("Error extracting {}: {}", url, classify_error(&e));
                None
            }
        }
    }
}

impl Drop for CrawlSession<'_> {
    fn drop(&mut self) {
        tracing::debug!("Closed crawl session");
    }
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection refused".to_string()
    } else if e.is_redirect() {
        "too many redirects".to_string()
    } else {
        e.to_string()
    }
}
