use crate::UrlError;
use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use kb_crawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `candidate` lives on exactly the same host and port as `root`
///
/// Subdomains do not match: `blog.example.com` is not the same host as
/// `example.com`. The scheme is ignored so `http://` and `https://` variants of
/// a page are both in scope.
pub fn same_host(root: &Url, candidate: &Url) -> bool {
    match (extract_domain(root), extract_domain(candidate)) {
        (Some(a), Some(b)) => a == b && root.port() == candidate.port(),
        _ => false,
    }
}

/// Parses a crawl root, accepting only absolute http(s) URLs with a host
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if extract_domain(&url).map_or(true, |d| d.is_empty()) {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}
