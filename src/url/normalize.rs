use url::Url;

/// Computes the deduplication key for a URL
///
/// # Normalization Steps
///
/// 1. Parse the URL; anything unparsable or without a host yields `""`
/// 2. Lowercase the scheme and host (keeping an explicit port)
/// 3. Strip every trailing slash from the path (the root becomes empty)
/// 4. Drop the query string, fragment, and userinfo
///
/// The storage layer computes its keys with this same function, so crawled
/// pages and stored documents always agree on identity.
///
/// # Examples
///
/// ```
/// use kb_crawler::url::normalize_key;
///
/// assert_eq!(normalize_key("https://A.com/x/?q=1#top"), "https://a.com/x");
/// assert_eq!(normalize_key("https://a.com/"), "https://a.com");
/// assert_eq!(normalize_key("not a url"), "");
/// ```
pub fn normalize_key(url_str: &str) -> String {
    let url_str = url_str.trim();
    if url_str.is_empty() {
        return String::new();
    }

    match Url::parse(url_str) {
        Ok(url) => key_for(&url),
        Err(_) => String::new(),
    }
}

/// Computes the key of an already-parsed URL
pub fn key_for(url: &Url) -> String {
    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_lowercase(),
        _ => return String::new(),
    };

    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };

    format!(
        "{}://{}{}",
        url.scheme().to_lowercase(),
        authority,
        url.path().trim_end_matches('/')
    )
}

/// Derives the storage filename for a crawled URL
///
/// The root page maps to `index.html`; every other page maps to its path
/// without surrounding slashes plus `.html`, so repeated crawls of a URL
/// always land on the same storage key.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use kb_crawler::url::filename_for_url;
///
/// let url = Url::parse("https://ex.com/docs/intro/").unwrap();
/// assert_eq!(filename_for_url(&url), "docs/intro.html");
/// ```
pub fn filename_for_url(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        "index.html".to_string()
    } else {
        format!("{}.html", path)
    }
}
