//! kb-crawler: incremental website ingestion for knowledge bases
//!
//! This crate crawls a website for pages that are not yet stored in a
//! knowledge base, preferring URLs declared in the site's sitemap over ones
//! discovered by following links, and reduces each page to clean text through
//! a rate-limited content-extraction service.

pub mod config;
pub mod crawler;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Recrawl requires at least one URL")]
    EmptyRecrawlList,

    #[error("No source URL recorded for knowledge base {0}")]
    MissingSourceUrl(String),

    #[error("No stored pages found for knowledge base {0}")]
    NoStoredPages(String),

    #[error("No content could be crawled for knowledge base {0}")]
    NothingCrawled(String),

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing extraction service credentials: set {0}")]
    MissingCredentials(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlRequest, PageRecord, WebCrawler};
pub use state::CrawlPhase;
pub use storage::{DocumentStore, DocumentType, SqliteStorage};
pub use crate::url::{filename_for_url, normalize_key};
