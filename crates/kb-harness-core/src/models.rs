//! Core data models shared by the ingestion and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque user identifier supplied by the authentication collaborator.
pub type UserId = i64;

/// Knowledge base identifier.
pub type KbId = i64;

/// A registered user. The password hash is opaque to this crate.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A named, owned collection of files and their chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: KbId,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// An uploaded file. `content` holds the raw bytes exactly as uploaded.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub kb_id: KbId,
    pub file_name: String,
    pub slug: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// File listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub name: String,
    pub slug: String,
}

/// A chunk of a file's extracted text with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub kb_id: KbId,
    pub file_name: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned from similarity search, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub file_name: String,
    pub index: i64,
    pub content: String,
}

impl From<&Chunk> for RetrievedChunk {
    fn from(c: &Chunk) -> Self {
        Self {
            file_name: c.file_name.clone(),
            index: c.chunk_index,
            content: c.content.clone(),
        }
    }
}

/// A generated answer plus the chunks that were used as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub chunks: Vec<RetrievedChunk>,
}
