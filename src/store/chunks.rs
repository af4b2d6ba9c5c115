//! `chunks`: document chunk index for retrieval.
//!
//! Contract text is split into overlapping chunks (`text-splitter`) and
//! written to an FTS5 virtual table, each row tagged with its `doc_id`.
//! Ranking is SQLite's BM25; this module never scores anything itself.
//!
//! ## Storage layout
//! ```text
//! {store_dir}/
//! └── chunks.db   # documents (one row per doc) + chunks (FTS5)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::info;

use super::now_iso8601;
use crate::error::AppError;

const DB_FILENAME: &str = "chunks.db";
const SCHEMA_VERSION: i64 = 1;

/// A chunk before it is stored: byte offset into the source text plus the slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub position: usize,
    pub text: String,
}

/// One search result.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub doc_id: String,
    pub text: String,
    pub position: usize,
    /// Higher is better (negated BM25).
    pub score: f32,
}

/// Per-document bookkeeping row.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub doc_id: String,
    pub content_hash: String,
    pub chunk_count: usize,
    pub indexed_at: String,
}

/// Split `text` into chunks of at most `chunk_size` characters, neighbours
/// sharing up to `chunk_overlap` characters. Whitespace-only chunks are dropped.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<ChunkSpan>, AppError> {
    if chunk_size == 0 {
        return Err(AppError::Store("chunk_size must be > 0".to_string()));
    }
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(chunk_overlap)
        .map_err(|e| AppError::Store(format!("invalid chunk config: {e}")))?;
    let splitter = TextSplitter::new(config);
    Ok(splitter
        .chunk_indices(text)
        .filter(|(_, t)| !t.trim().is_empty())
        .map(|(position, t)| ChunkSpan { position, text: t.to_string() })
        .collect())
}

#[derive(Debug, Clone)]
pub struct ChunkStore {
    db_path: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkStore {
    /// Open (or create) the index under `dir`.
    pub fn open(dir: &Path, chunk_size: usize, chunk_overlap: usize) -> Result<Self, AppError> {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Store(format!("chunks: cannot create {}: {e}", dir.display())))?;
        let store = Self {
            db_path: dir.join(DB_FILENAME),
            chunk_size,
            chunk_overlap,
        };
        store.init_db()?;
        Ok(store)
    }

    /// Chunk `text` and replace everything previously indexed for `doc_id`.
    /// Returns the number of chunks stored.
    pub fn index_document(&self, doc_id: &str, text: &str, content_hash: &str) -> Result<usize, AppError> {
        let spans = split_text(text, self.chunk_size, self.chunk_overlap)?;

        let mut conn = self.open_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Store(format!("chunks: begin index tx: {e}")))?;

        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])
            .map_err(|e| AppError::Store(format!("chunks: clear chunks for {doc_id}: {e}")))?;

        for span in &spans {
            tx.execute(
                "INSERT INTO chunks (id, doc_id, text, position) VALUES (?1, ?2, ?3, ?4)",
                params![
                    uuid::Uuid::now_v7().to_string(),
                    doc_id,
                    span.text,
                    span.position as i64
                ],
            )
            .map_err(|e| AppError::Store(format!("chunks: insert chunk: {e}")))?;
        }

        tx.execute(
            "INSERT INTO documents (doc_id, content_hash, chunk_count, indexed_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(doc_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at",
            params![doc_id, content_hash, spans.len() as i64, now_iso8601()],
        )
        .map_err(|e| AppError::Store(format!("chunks: upsert document {doc_id}: {e}")))?;

        tx.commit()
            .map_err(|e| AppError::Store(format!("chunks: commit index tx: {e}")))?;

        info!(doc_id = %doc_id, chunks = spans.len(), "stored {} chunks for {}", spans.len(), doc_id);
        Ok(spans.len())
    }

    /// Remove a document and all its chunks. Unknown ids are a no-op.
    pub fn remove_document(&self, doc_id: &str) -> Result<(), AppError> {
        let mut conn = self.open_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Store(format!("chunks: begin delete tx: {e}")))?;
        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])
            .map_err(|e| AppError::Store(format!("chunks: delete chunks for {doc_id}: {e}")))?;
        tx.execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])
            .map_err(|e| AppError::Store(format!("chunks: delete document {doc_id}: {e}")))?;
        tx.commit()
            .map_err(|e| AppError::Store(format!("chunks: commit delete tx: {e}")))?;
        Ok(())
    }

    pub fn documents(&self) -> Result<Vec<IndexedDocument>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT doc_id, content_hash, chunk_count, indexed_at FROM documents ORDER BY doc_id",
            )
            .map_err(|e| AppError::Store(format!("chunks: prepare documents: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(IndexedDocument {
                    doc_id: row.get(0)?,
                    content_hash: row.get(1)?,
                    chunk_count: row.get::<_, i64>(2)? as usize,
                    indexed_at: row.get(3)?,
                })
            })
            .map_err(|e| AppError::Store(format!("chunks: query documents: {e}")))?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row.map_err(|e| AppError::Store(format!("chunks: map documents row: {e}")))?);
        }
        Ok(docs)
    }

    /// BM25-ranked search over all chunks.
    ///
    /// Returns an empty list for an empty query or `top_k == 0`.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<ChunkHit>, AppError> {
        let fts_query = escape_fts5_query(query);
        if fts_query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT doc_id, text, position, bm25(chunks) AS rank
                 FROM chunks
                 WHERE chunks MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )
            .map_err(|e| AppError::Store(format!("chunks: prepare search: {e}")))?;

        let rows = stmt
            .query_map(params![fts_query, top_k as i64], |row| {
                let rank: f64 = row.get(3)?;
                Ok(ChunkHit {
                    doc_id: row.get(0)?,
                    text: row.get(1)?,
                    position: row.get::<_, i64>(2)? as usize,
                    score: (-rank) as f32,
                })
            })
            .map_err(|e| AppError::Store(format!("chunks: execute search: {e}")))?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.map_err(|e| AppError::Store(format!("chunks: map search row: {e}")))?);
        }
        Ok(hits)
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(|e| AppError::Store(format!("chunks: read schema version: {e}")))?;

        if version == 0 {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS documents (
                    doc_id TEXT PRIMARY KEY,
                    content_hash TEXT NOT NULL,
                    chunk_count INTEGER NOT NULL,
                    indexed_at TEXT NOT NULL
                );

                CREATE VIRTUAL TABLE IF NOT EXISTS chunks USING fts5(
                    id UNINDEXED,
                    doc_id UNINDEXED,
                    text,
                    position UNINDEXED
                );

                PRAGMA user_version = 1;
                ",
            )
            .map_err(|e| AppError::Store(format!("chunks: initialize schema: {e}")))?;
            return Ok(());
        }

        if version != SCHEMA_VERSION {
            return Err(AppError::Store(format!(
                "chunks: unsupported schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }
        Ok(())
    }

    fn open_conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| AppError::Store(format!("chunks: open {}: {e}", self.db_path.display())))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Store(format!("chunks: set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Store(format!("chunks: set busy_timeout: {e}")))?;
        Ok(conn)
    }
}

/// Quote every token so user input is always a list of phrases. Bare words
/// like `OR`, `NOT` or `NEAR` would otherwise parse as FTS5 operators.
fn escape_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}
