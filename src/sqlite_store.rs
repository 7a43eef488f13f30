//! SQLite-backed [`Store`] implementation.
//!
//! Persists users, knowledge bases, files (raw bytes), and chunks (with their
//! embeddings as little-endian `f32` BLOBs) in one SQLite database.
//! Nearest-neighbour search is a brute-force Euclidean scan over the chunks
//! of a single knowledge base, read in insertion order so ties are stable.
//!
//! Every `sqlx` error maps to [`KbError::Store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use kb_harness_core::embedding::{blob_to_vec, check_dims, vec_to_blob};
use kb_harness_core::models::{
    Chunk, FileRecord, FileSummary, KbId, KnowledgeBase, User, UserId,
};
use kb_harness_core::store::{rank_by_distance, Store};
use kb_harness_core::{KbError, Result};

use crate::config::Config;
use crate::db;
use crate::migrate;

/// SQLite store over a shared connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    /// Connect to the configured database, run migrations, and wrap the pool.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool, config.embedding.dims))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn store_err(e: sqlx::Error) -> KbError {
    KbError::Store(e.to_string())
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn row_to_kb(row: &SqliteRow) -> KnowledgeBase {
    KnowledgeBase {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        created_at: timestamp(row.get("created_at")),
    }
}

fn row_to_chunk(row: &SqliteRow, dims: usize) -> Result<Chunk> {
    let blob: Vec<u8> = row.get("embedding");
    let embedding = blob_to_vec(&blob);
    check_dims(dims, &embedding)?;
    Ok(Chunk {
        kb_id: row.get("kb_id"),
        file_name: row.get("file_name"),
        chunk_index: row.get("chunk_index"),
        content: row.get("content"),
        embedding,
    })
}

#[async_trait]
impl Store for SqliteStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let now = Utc::now();
        let result =
            sqlx::query("INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)")
                .bind(email)
                .bind(password_hash)
                .bind(now.timestamp())
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(User {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: timestamp(now.timestamp()),
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(|r| User {
            id: r.get("id"),
            email: r.get("email"),
            password_hash: r.get("password_hash"),
            created_at: timestamp(r.get("created_at")),
        }))
    }

    async fn create_kb(&self, owner_id: UserId, name: &str) -> Result<KnowledgeBase> {
        let now = Utc::now().timestamp();
        let result =
            sqlx::query("INSERT INTO knowledge_bases (name, owner_id, created_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(owner_id)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(KnowledgeBase {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            owner_id,
            created_at: timestamp(now),
        })
    }

    async fn kb_owner(&self, kb_id: KbId) -> Result<Option<UserId>> {
        sqlx::query_scalar("SELECT owner_id FROM knowledge_bases WHERE id = ?")
            .bind(kb_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn list_kbs(&self, owner_id: UserId) -> Result<Vec<KnowledgeBase>> {
        let rows = sqlx::query(
            "SELECT id, name, owner_id, created_at FROM knowledge_bases WHERE owner_id = ? ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.iter().map(row_to_kb).collect())
    }

    async fn find_file_by_name(&self, kb_id: KbId, file_name: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT slug FROM files WHERE kb_id = ? AND file_name = ?")
            .bind(kb_id)
            .bind(file_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn slug_exists(&self, kb_id: KbId, slug: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM files WHERE kb_id = ? AND slug = ?")
            .bind(kb_id)
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn list_files(&self, kb_id: KbId) -> Result<Vec<FileSummary>> {
        let rows = sqlx::query(
            "SELECT file_name, slug FROM files WHERE kb_id = ? ORDER BY file_name",
        )
        .bind(kb_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows
            .iter()
            .map(|r| FileSummary {
                name: r.get("file_name"),
                slug: r.get("slug"),
            })
            .collect())
    }

    async fn get_file(&self, kb_id: KbId, slug: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT kb_id, file_name, slug, mime_type, content, created_at \
             FROM files WHERE kb_id = ? AND slug = ?",
        )
        .bind(kb_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(|r| FileRecord {
            kb_id: r.get("kb_id"),
            file_name: r.get("file_name"),
            slug: r.get("slug"),
            mime_type: r.get("mime_type"),
            content: r.get("content"),
            created_at: timestamp(r.get("created_at")),
        }))
    }

    async fn commit_file(&self, file: &FileRecord, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            check_dims(self.dims, &chunk.embedding)?;
        }

        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Write first so the transaction takes the write lock immediately.
        sqlx::query(
            r#"
            INSERT INTO files (kb_id, file_name, slug, mime_type, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(kb_id, file_name) DO UPDATE SET
                slug = excluded.slug,
                mime_type = excluded.mime_type,
                content = excluded.content,
                created_at = excluded.created_at
            "#,
        )
        .bind(file.kb_id)
        .bind(&file.file_name)
        .bind(&file.slug)
        .bind(&file.mime_type)
        .bind(&file.content)
        .bind(file.created_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            warn!(kb_id = file.kb_id, slug = %file.slug, error = %e, "file upsert failed");
            store_err(e)
        })?;

        let deleted = sqlx::query("DELETE FROM chunks WHERE kb_id = ? AND file_name = ?")
            .bind(file.kb_id)
            .bind(&file.file_name)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?
            .rows_affected();

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (kb_id, file_name, chunk_index, content, dims, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(chunk.kb_id)
            .bind(&chunk.file_name)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(chunk.embedding.len() as i64)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        debug!(
            kb_id = file.kb_id,
            file = %file.file_name,
            replaced = deleted,
            inserted = chunks.len(),
            "file committed"
        );
        Ok(())
    }

    async fn insert_chunk(&self, chunk: &Chunk) -> Result<()> {
        check_dims(self.dims, &chunk.embedding)?;
        sqlx::query(
            "INSERT INTO chunks (kb_id, file_name, chunk_index, content, dims, embedding) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(chunk.kb_id)
        .bind(&chunk.file_name)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(chunk.embedding.len() as i64)
        .bind(vec_to_blob(&chunk.embedding))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn chunks_for_file(&self, kb_id: KbId, file_name: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT kb_id, file_name, chunk_index, content, embedding FROM chunks \
             WHERE kb_id = ? AND file_name = ? ORDER BY chunk_index",
        )
        .bind(kb_id)
        .bind(file_name)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(|r| row_to_chunk(r, self.dims)).collect()
    }

    async fn nearest(&self, kb_id: KbId, query: &[f32], k: usize) -> Result<Vec<Chunk>> {
        check_dims(self.dims, query)?;
        let rows = sqlx::query(
            "SELECT kb_id, file_name, chunk_index, content, embedding FROM chunks \
             WHERE kb_id = ? ORDER BY id",
        )
        .bind(kb_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        let candidates = rows
            .iter()
            .map(|r| row_to_chunk(r, self.dims))
            .collect::<Result<Vec<_>>>()?;
        debug!(kb_id, candidates = candidates.len(), k, "nearest scan");
        Ok(rank_by_distance(candidates, query, k))
    }
}
