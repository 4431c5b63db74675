//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the DocumentStore trait.

use crate::crawler::PageRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DocumentStore, StorageError, StorageResult};
use crate::storage::{DocumentListing, DocumentType, StoredFile};
use crate::url::normalize_key;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_custom_metadata(
        &self,
        knowledgebase_id: &str,
        doc_type: DocumentType,
    ) -> StorageResult<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM knowledgebase_metadata
             WHERE knowledgebase_id = ?1 AND doc_type = ?2",
        )?;

        let rows = stmt.query_map(params![knowledgebase_id, doc_type.to_db_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut metadata = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    fn load_files(
        &self,
        knowledgebase_id: &str,
        doc_type: DocumentType,
    ) -> StorageResult<Vec<StoredFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT filename, path, url, size, stored_at FROM documents
             WHERE knowledgebase_id = ?1 AND doc_type = ?2
             ORDER BY id",
        )?;

        let rows = stmt.query_map(params![knowledgebase_id, doc_type.to_db_string()], |row| {
            Ok(StoredFile {
                filename: row.get(0)?,
                path: row.get(1)?,
                url: row.get(2)?,
                size: row.get::<_, i64>(3)? as usize,
                stored_at: row.get(4)?,
            })
        })?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Returns the metadata stored for one document
    pub fn get_document_metadata(
        &self,
        knowledgebase_id: &str,
        doc_type: DocumentType,
        filename: &str,
    ) -> StorageResult<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.key, m.value FROM document_metadata m
             JOIN documents d ON d.id = m.document_id
             WHERE d.knowledgebase_id = ?1 AND d.doc_type = ?2 AND d.filename = ?3",
        )?;

        let rows = stmt.query_map(
            params![knowledgebase_id, doc_type.to_db_string(), filename],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut metadata = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }
}

fn check_knowledgebase_id(knowledgebase_id: &str) -> StorageResult<()> {
    if knowledgebase_id.trim().is_empty() {
        return Err(StorageError::EmptyKnowledgebaseId);
    }
    Ok(())
}

impl DocumentStore for SqliteStorage {
    fn get_documents(
        &self,
        knowledgebase_id: &str,
        doc_type: DocumentType,
    ) -> StorageResult<Option<DocumentListing>> {
        check_knowledgebase_id(knowledgebase_id)?;

        let files = self.load_files(knowledgebase_id, doc_type)?;
        let custom_metadata = self.load_custom_metadata(knowledgebase_id, doc_type)?;

        if files.is_empty() && custom_metadata.is_empty() {
            return Ok(None);
        }

        Ok(Some(DocumentListing {
            files,
            custom_metadata,
        }))
    }

    fn store_crawled(
        &mut self,
        knowledgebase_id: &str,
        pages: &[PageRecord],
        metadata: &BTreeMap<String, String>,
    ) -> StorageResult<DocumentListing> {
        check_knowledgebase_id(knowledgebase_id)?;

        let doc_type = DocumentType::Crawled;
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut stored = 0;

        for page in pages {
            if page.content.trim().is_empty() {
                tracing::warn!("Skipping empty content for URL: {}", page.url);
                continue;
            }

            let path = format!("{}/{}/{}", knowledgebase_id, doc_type, page.filename);
            let url_key = normalize_key(&page.url);

            tx.execute(
                "INSERT INTO documents
                    (knowledgebase_id, doc_type, filename, path, url, url_key, content, size, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(knowledgebase_id, doc_type, filename) DO UPDATE SET
                    path = excluded.path,
                    url = excluded.url,
                    url_key = excluded.url_key,
                    content = excluded.content,
                    size = excluded.size,
                    stored_at = excluded.stored_at",
                params![
                    knowledgebase_id,
                    doc_type.to_db_string(),
                    page.filename,
                    path,
                    page.url,
                    url_key,
                    page.content,
                    page.content.len() as i64,
                    now,
                ],
            )?;

            let document_id: i64 = tx.query_row(
                "SELECT id FROM documents
                 WHERE knowledgebase_id = ?1 AND doc_type = ?2 AND filename = ?3",
                params![knowledgebase_id, doc_type.to_db_string(), page.filename],
                |row| row.get(0),
            )?;

            tx.execute(
                "DELETE FROM document_metadata WHERE document_id = ?1",
                params![document_id],
            )?;
            for (key, value) in &page.metadata {
                tx.execute(
                    "INSERT INTO document_metadata (document_id, key, value) VALUES (?1, ?2, ?3)",
                    params![document_id, key, value],
                )?;
            }

            stored += 1;
        }

        if stored == 0 {
            // Dropping the transaction rolls it back
            return Err(StorageError::NothingToStore);
        }

        for (key, value) in metadata {
            tx.execute(
                "INSERT INTO knowledgebase_metadata (knowledgebase_id, doc_type, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(knowledgebase_id, doc_type, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![knowledgebase_id, doc_type.to_db_string(), key, value, now],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            "Stored {} crawled documents for knowledge base {}",
            stored,
            knowledgebase_id
        );

        Ok(DocumentListing {
            files: self.load_files(knowledgebase_id, doc_type)?,
            custom_metadata: self.load_custom_metadata(knowledgebase_id, doc_type)?,
        })
    }

    fn get_document_content(
        &self,
        knowledgebase_id: &str,
        doc_type: DocumentType,
        filename: &str,
    ) -> StorageResult<Option<String>> {
        check_knowledgebase_id(knowledgebase_id)?;

        let content = self
            .conn
            .query_row(
                "SELECT content FROM documents
                 WHERE knowledgebase_id = ?1 AND doc_type = ?2 AND filename = ?3",
                params![knowledgebase_id, doc_type.to_db_string(), filename],
                |row| row.get(0),
            )
            .optional()?;

        Ok(content)
    }

    fn list_knowledgebases(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT knowledgebase_id FROM documents ORDER BY knowledgebase_id",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}
