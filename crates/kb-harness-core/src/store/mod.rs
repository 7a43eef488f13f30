//! Storage abstraction for knowledge bases, files, and chunks.
//!
//! The [`Store`] trait defines every persistence operation the ingestion
//! and query pipelines need, so the SQLite backend and the in-memory backend
//! are interchangeable. Implementations must be `Send + Sync` to work with
//! async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, FileRecord, FileSummary, KbId, KnowledgeBase, User, UserId};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_user`](Store::create_user) | Register a user |
/// | [`create_kb`](Store::create_kb) | Create a knowledge base owned by a user |
/// | [`kb_owner`](Store::kb_owner) | Owner lookup for the access gate |
/// | [`commit_file`](Store::commit_file) | Atomically replace a file and its chunks |
/// | [`insert_chunk`](Store::insert_chunk) | Append one chunk row |
/// | [`nearest`](Store::nearest) | K nearest chunks within one knowledge base |
///
/// Every chunk write checks that the vector length equals [`dims`](Store::dims)
/// and fails with [`KbError::DimensionMismatch`](crate::KbError::DimensionMismatch)
/// otherwise.
#[async_trait]
pub trait Store: Send + Sync {
    /// Configured embedding dimensionality.
    fn dims(&self) -> usize;

    /// Insert a user. Emails are unique.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User>;

    /// Fetch a user by ID.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Create a knowledge base owned by `owner_id`.
    async fn create_kb(&self, owner_id: UserId, name: &str) -> Result<KnowledgeBase>;

    /// Owner of a knowledge base, or `None` if it does not exist.
    async fn kb_owner(&self, kb_id: KbId) -> Result<Option<UserId>>;

    /// Knowledge bases owned by `owner_id`, ordered by ID.
    async fn list_kbs(&self, owner_id: UserId) -> Result<Vec<KnowledgeBase>>;

    /// Slug of the file with this exact name in the knowledge base, if any.
    async fn find_file_by_name(&self, kb_id: KbId, file_name: &str) -> Result<Option<String>>;

    /// Whether any file in the knowledge base already uses `slug`.
    async fn slug_exists(&self, kb_id: KbId, slug: &str) -> Result<bool>;

    /// Files in a knowledge base, ordered by file name.
    async fn list_files(&self, kb_id: KbId) -> Result<Vec<FileSummary>>;

    /// A file with its raw bytes, looked up by slug.
    async fn get_file(&self, kb_id: KbId, slug: &str) -> Result<Option<FileRecord>>;

    /// Upsert `file` and replace all chunks of `(kb_id, file_name)` with `chunks`.
    ///
    /// All-or-nothing: on any error (including a dimension mismatch) neither
    /// the file row nor any chunk row is changed.
    async fn commit_file(&self, file: &FileRecord, chunks: &[Chunk]) -> Result<()>;

    /// Append a single chunk row.
    async fn insert_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Chunks of one file ordered by `chunk_index`.
    async fn chunks_for_file(&self, kb_id: KbId, file_name: &str) -> Result<Vec<Chunk>>;

    /// Up to `k` chunks of `kb_id` ordered by ascending Euclidean distance to
    /// `query`, ties broken by insertion order.
    async fn nearest(&self, kb_id: KbId, query: &[f32], k: usize) -> Result<Vec<Chunk>>;
}

/// Rank candidate chunks by Euclidean distance to `query` and keep the first `k`.
///
/// The sort is stable over the incoming order, so callers must pass rows in
/// insertion order for ties to resolve correctly.
pub fn rank_by_distance(candidates: Vec<Chunk>, query: &[f32], k: usize) -> Vec<Chunk> {
    let mut scored: Vec<(f32, Chunk)> = candidates
        .into_iter()
        .map(|c| (crate::embedding::euclidean_distance(query, &c.embedding), c))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored.into_iter().map(|(_, c)| c).collect()
}
