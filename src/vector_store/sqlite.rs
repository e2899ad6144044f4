//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and cosine similarity is
//! computed in Rust. A restaurant catalog is a few hundred documents at most,
//! so a full scan per query is cheap.

use super::{rank, Document, SearchResult, SimilarityQuery, VectorStore};
use crate::error::{Result, SavorError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        record_key TEXT NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_record_key ON documents(record_key);
"#;

const INSERT: &str = r#"
    INSERT OR REPLACE INTO documents (id, record_key, content, embedding, indexed_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SavorError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id_str: String = row.get(0)?;
        let embedding_bytes: Vec<u8> = row.get(3)?;
        let indexed_at_str: String = row.get(4)?;

        Ok(Document {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            record_key: row.get(1)?,
            content: row.get(2)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn all_documents(conn: &Connection) -> Result<Vec<Document>> {
        let mut stmt = conn.prepare(
            "SELECT id, record_key, content, embedding, indexed_at FROM documents ORDER BY seq",
        )?;
        let docs = stmt.query_map([], Self::row_to_document)?;
        Ok(docs.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, doc))]
    async fn insert(&self, doc: &Document) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            INSERT,
            params![
                doc.id.to_string(),
                doc.record_key,
                doc.content,
                Self::embedding_to_bytes(&doc.embedding),
                doc.indexed_at.to_rfc3339(),
            ],
        )?;

        debug!("Inserted document {}", doc.id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM documents", [])?;
        info!("Deleted {} documents", deleted);
        Ok(deleted)
    }

    #[instrument(skip(self, query), fields(threshold = query.match_threshold, count = query.match_count))]
    async fn search(&self, query: &SimilarityQuery) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;
        let results = rank(Self::all_documents(&conn)?, query);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        Self::all_documents(&conn)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
