//! URL handling module
//!
//! This module provides the deduplication key used by both the crawler and the
//! storage layer, the same-host test used for link discovery, and the
//! filename rule for crawled pages.

mod domain;
mod normalize;

pub use domain::{extract_domain, parse_http_url, same_host};
pub use normalize::{filename_for_url, key_for, normalize_key};
