//! Storage traits and error types
//!
//! This module defines the trait interface the crawler and the ingestion
//! workflows use to read and write a knowledge base's documents.

use crate::crawler::PageRecord;
use crate::storage::{DocumentListing, DocumentType};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("knowledgebase_id cannot be empty")]
    EmptyKnowledgebaseId,

    #[error("No documents with content to store")]
    NothingToStore,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for knowledge base document stores
///
/// The crawler only ever reads through this trait (to learn which URLs are
/// already stored); writes are issued by the caller that owns the crawl
/// results.
pub trait DocumentStore {
    /// Lists the documents of one type stored for a knowledge base
    ///
    /// Returns `None` when nothing of that type has been stored yet.
    fn get_documents(
        &self,
        knowledgebase_id: &str,
        doc_type: DocumentType,
    ) -> StorageResult<Option<DocumentListing>>;

    /// Stores crawled pages and merges `metadata` into the listing's custom metadata
    ///
    /// Pages with empty content are skipped. A page whose filename is already
    /// stored replaces the earlier content in place.
    ///
    /// # Returns
    ///
    /// The full listing after the write
    fn store_crawled(
        &mut self,
        knowledgebase_id: &str,
        pages: &[PageRecord],
        metadata: &BTreeMap<String, String>,
    ) -> StorageResult<DocumentListing>;

    /// Reads the content of one stored document
    fn get_document_content(
        &self,
        knowledgebase_id: &str,
        doc_type: DocumentType,
        filename: &str,
    ) -> StorageResult<Option<String>>;

    /// Lists every knowledge base that has stored documents
    fn list_knowledgebases(&self) -> StorageResult<Vec<String>>;
}
