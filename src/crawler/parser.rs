//! HTML parser for extracting same-host links
//!
//! Links are resolved against the page they were found on, restricted to the
//! crawl root's exact host, and filtered against the URLs already visited in
//! the session.

use crate::url::{key_for, same_host};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts the links on a page that the crawl may follow
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Links to any host other than the root's (subdomains included)
/// - Links whose key is in `visited`
///
/// For every `http://` link the `https://` variant is emitted first, followed
/// by the original. Fragments are dropped from emitted URLs.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The URL the HTML was fetched from, for resolving relative links
/// * `root` - The crawl root, which defines the allowed host
/// * `visited` - Keys of URLs already attempted this session
///
/// # Example
///
/// ```
/// use kb_crawler::crawler::extract_links;
/// use std::collections::HashSet;
/// use url::Url;
///
/// let root = Url::parse("https://ex.com/").unwrap();
/// let html = r#"<a href="/docs">Docs</a><a href="https://other.com/">Other</a>"#;
/// let links = extract_links(html, &root, &root, &HashSet::new());
/// assert_eq!(links, vec!["https://ex.com/docs"]);
/// ```
pub fn extract_links(
    html: &str,
    page_url: &Url,
    root: &Url,
    visited: &HashSet<String>,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = resolve_link(href, page_url) else {
            continue;
        };

        if absolute.scheme() == "http" {
            if let Some(secure) = https_variant(&absolute) {
                push_if_new(&mut links, secure, root, visited);
            }
        }
        push_if_new(&mut links, absolute, root, visited);
    }

    links
}

fn push_if_new(links: &mut Vec<String>, url: Url, root: &Url, visited: &HashSet<String>) {
    if !same_host(root, &url) {
        return;
    }
    if visited.contains(&key_for(&url)) {
        return;
    }
    links.push(url.to_string());
}

fn https_variant(url: &Url) -> Option<Url> {
    Url::parse(&format!("https://{}", &url.as_str()["http://".len()..])).ok()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}
