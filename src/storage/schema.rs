//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the knowledge base store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Stored documents, one row per (knowledge base, type, filename)
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    knowledgebase_id TEXT NOT NULL,
    doc_type TEXT NOT NULL,
    filename TEXT NOT NULL,
    path TEXT NOT NULL,
    url TEXT,
    url_key TEXT,
    content TEXT NOT NULL,
    size INTEGER NOT NULL,
    stored_at TEXT NOT NULL,
    UNIQUE(knowledgebase_id, doc_type, filename)
);

CREATE INDEX IF NOT EXISTS idx_documents_kb ON documents(knowledgebase_id, doc_type);
CREATE INDEX IF NOT EXISTS idx_documents_url_key ON documents(url_key);

-- Per-document metadata produced by the crawler (title, crawled_at, ...)
CREATE TABLE IF NOT EXISTS document_metadata (
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY(document_id, key)
);

-- Knowledge-base level metadata (source_url, max_depth, ...)
CREATE TABLE IF NOT EXISTS knowledgebase_metadata (
    knowledgebase_id TEXT NOT NULL,
    doc_type TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY(knowledgebase_id, doc_type, key)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
