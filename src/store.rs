//! SQLite storage layer.
//!
//! Owns the connection, schema migrations, and all reads/writes for
//! documents, chunks, and embedding vectors. The index is rebuilt whole
//! per source: re-ingesting a document replaces every row derived from it.
//!
//! Vectors are stored as little-endian f32 BLOBs next to a bookkeeping
//! row recording the model, dimensionality, and text hash, so stale
//! embeddings are detectable after re-chunking.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::config::Config;
use crate::models::{Chunk, ContentKind, Document};

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create all tables and indexes. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            page INTEGER NOT NULL,
            kind TEXT NOT NULL,
            table_number INTEGER,
            image_path TEXT,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(document_id, chunk_index),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            chunk_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_page ON documents(page)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}

/// Delete every row derived from `source`: vectors, embeddings, chunks,
/// documents. Used before re-ingesting the same file.
pub async fn delete_source(pool: &SqlitePool, source: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM chunk_vectors WHERE document_id IN (SELECT id FROM documents WHERE source = ?)",
    )
    .bind(source)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM embeddings WHERE chunk_id IN \
         (SELECT c.id FROM chunks c JOIN documents d ON d.id = c.document_id WHERE d.source = ?)",
    )
    .bind(source)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM chunks WHERE document_id IN (SELECT id FROM documents WHERE source = ?)",
    )
    .bind(source)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM documents WHERE source = ?")
        .bind(source)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Insert a document row and its chunks in one transaction.
pub async fn insert_document_with_chunks(
    pool: &SqlitePool,
    doc: &Document,
    chunks: &[Chunk],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, source, page, kind, table_number, image_path, content, content_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.source)
    .bind(doc.page as i64)
    .bind(doc.kind.as_str())
    .bind(doc.table_number.map(|n| n as i64))
    .bind(&doc.image_path)
    .bind(&doc.content)
    .bind(&doc.content_hash)
    .bind(doc.created_at)
    .execute(&mut *tx)
    .await?;

    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// A stored vector joined with its chunk text and document provenance,
/// loaded wholesale for similarity scoring.
pub struct VectorRow {
    pub chunk_id: String,
    pub document_id: String,
    pub embedding: Vec<u8>,
    pub text: String,
    pub chunk_index: i64,
    pub page: u32,
    pub kind: ContentKind,
    pub source: String,
}

pub async fn load_vector_rows(pool: &SqlitePool) -> Result<Vec<VectorRow>> {
    let rows = sqlx::query(
        r#"
        SELECT cv.chunk_id, cv.document_id, cv.embedding,
               c.text, c.chunk_index,
               d.page, d.kind, d.source
        FROM chunk_vectors cv
        JOIN chunks c ON c.id = cv.chunk_id
        JOIN documents d ON d.id = cv.document_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let result = rows
        .iter()
        .map(|row| {
            let kind_str: String = row.get("kind");
            VectorRow {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                embedding: row.get("embedding"),
                text: row.get("text"),
                chunk_index: row.get("chunk_index"),
                page: row.get::<i64, _>("page") as u32,
                kind: ContentKind::parse(&kind_str).unwrap_or(ContentKind::Text),
                source: row.get("source"),
            }
        })
        .collect();

    Ok(result)
}

/// A chunk missing an embedding, or whose text changed since it was last
/// embedded under `model`.
pub struct PendingChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub text_hash: String,
}

pub async fn find_pending_chunks(
    pool: &SqlitePool,
    model: &str,
    limit: Option<usize>,
) -> Result<Vec<PendingChunk>> {
    let limit_val = limit.unwrap_or(usize::MAX.min(i64::MAX as usize)) as i64;

    let rows = sqlx::query(
        r#"
        SELECT c.id AS chunk_id, c.document_id, c.text
        FROM chunks c
        LEFT JOIN embeddings e ON e.chunk_id = c.id AND e.model = ?
        WHERE e.chunk_id IS NULL OR e.hash != c.hash
        ORDER BY c.document_id, c.chunk_index
        LIMIT ?
        "#,
    )
    .bind(model)
    .bind(limit_val)
    .fetch_all(pool)
    .await?;

    let results = rows
        .iter()
        .map(|row| {
            let text: String = row.get("text");
            let text_hash = hash_text(&text);
            PendingChunk {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                text,
                text_hash,
            }
        })
        .collect();

    Ok(results)
}

pub async fn upsert_embedding(
    pool: &SqlitePool,
    chunk_id: &str,
    document_id: &str,
    model: &str,
    dims: usize,
    chunk_hash: &str,
    blob: &[u8],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO embeddings (chunk_id, model, dims, hash, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            hash = excluded.hash,
            created_at = excluded.created_at
        "#,
    )
    .bind(chunk_id)
    .bind(model)
    .bind(dims as i64)
    .bind(chunk_hash)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, document_id, embedding)
        VALUES (?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            document_id = excluded.document_id,
            embedding = excluded.embedding
        "#,
    )
    .bind(chunk_id)
    .bind(document_id)
    .bind(blob)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up the stored embedding hash for a chunk under `model`.
pub async fn embedding_hash(
    pool: &SqlitePool,
    chunk_id: &str,
    model: &str,
) -> Result<Option<String>> {
    let hash = sqlx::query_scalar("SELECT hash FROM embeddings WHERE chunk_id = ? AND model = ?")
        .bind(chunk_id)
        .bind(model)
        .fetch_optional(pool)
        .await?;
    Ok(hash)
}

pub async fn clear_embeddings(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM chunk_vectors").execute(pool).await?;
    sqlx::query("DELETE FROM embeddings").execute(pool).await?;
    Ok(())
}

pub async fn count_documents(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?)
}

pub async fn count_chunks(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?)
}

pub async fn count_vectors(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(pool)
        .await?)
}

/// Sources present in the index, newest first.
pub async fn indexed_sources(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT source, MAX(created_at) AS latest FROM documents GROUP BY source ORDER BY latest DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|row| row.get("source")).collect())
}

/// Per-kind document/chunk counts for the stats overview.
pub struct KindStats {
    pub kind: String,
    pub doc_count: i64,
    pub chunk_count: i64,
}

pub async fn kind_breakdown(pool: &SqlitePool) -> Result<Vec<KindStats>> {
    let rows = sqlx::query(
        r#"
        SELECT d.kind,
               COUNT(DISTINCT d.id) AS doc_count,
               COUNT(DISTINCT c.id) AS chunk_count
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        GROUP BY d.kind
        ORDER BY doc_count DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| KindStats {
            kind: row.get("kind"),
            doc_count: row.get("doc_count"),
            chunk_count: row.get("chunk_count"),
        })
        .collect())
}

pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
