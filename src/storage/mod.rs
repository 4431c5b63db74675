//! Storage module for knowledge base documents
//!
//! This module is the storage collaborator of the crawler:
//! - SQLite database initialization and schema management
//! - Listing the documents already stored for a knowledge base
//! - Persisting crawled pages with their metadata
//! - Knowledge-base level metadata used to resume crawls

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DocumentStore, StorageError, StorageResult};

use crate::url::normalize_key;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kind of document stored in a knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Files,
    Text,
    Qa,
    Crawled,
}

impl DocumentType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Text => "text",
            Self::Qa => "qa",
            Self::Crawled => "crawled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "files" => Some(Self::Files),
            "text" => Some(Self::Text),
            "qa" => Some(Self::Qa),
            "crawled" => Some(Self::Crawled),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A document entry in a knowledge base listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    /// Storage key: `<knowledgebase>/<type>/<filename>`
    pub path: String,
    pub url: Option<String>,
    pub size: usize,
    pub stored_at: String,
}

/// Listing of the documents of one type in a knowledge base
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentListing {
    pub files: Vec<StoredFile>,
    pub custom_metadata: BTreeMap<String, String>,
}

impl DocumentListing {
    /// URLs of stored files, in storage order, skipping files without one
    pub fn urls(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| f.url.clone())
            .filter(|u| !u.trim().is_empty())
            .collect()
    }

    /// Normalized keys of every stored URL
    pub fn url_keys(&self) -> HashSet<String> {
        self.files
            .iter()
            .filter_map(|f| f.url.as_deref())
            .map(normalize_key)
            .filter(|k| !k.is_empty())
            .collect()
    }
}
