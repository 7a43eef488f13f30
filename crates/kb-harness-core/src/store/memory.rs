//! In-memory [`Store`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Nearest-neighbour search is a
//! brute-force scan in insertion order.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::embedding::check_dims;
use crate::error::{KbError, Result};
use crate::models::{Chunk, FileRecord, FileSummary, KbId, KnowledgeBase, User, UserId};

use super::{rank_by_distance, Store};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    kbs: Vec<KnowledgeBase>,
    files: Vec<FileRecord>,
    chunks: Vec<Chunk>,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    dims: usize,
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| KbError::Store("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| KbError::Store("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let mut t = self.write()?;
        if t.users.iter().any(|u| u.email == email) {
            return Err(KbError::Store(format!("user {} already exists", email)));
        }
        let user = User {
            id: t.users.len() as UserId + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_kb(&self, owner_id: UserId, name: &str) -> Result<KnowledgeBase> {
        let mut t = self.write()?;
        let kb = KnowledgeBase {
            id: t.kbs.len() as KbId + 1,
            name: name.to_string(),
            owner_id,
            created_at: Utc::now(),
        };
        t.kbs.push(kb.clone());
        Ok(kb)
    }

    async fn kb_owner(&self, kb_id: KbId) -> Result<Option<UserId>> {
        Ok(self
            .read()?
            .kbs
            .iter()
            .find(|kb| kb.id == kb_id)
            .map(|kb| kb.owner_id))
    }

    async fn list_kbs(&self, owner_id: UserId) -> Result<Vec<KnowledgeBase>> {
        Ok(self
            .read()?
            .kbs
            .iter()
            .filter(|kb| kb.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_file_by_name(&self, kb_id: KbId, file_name: &str) -> Result<Option<String>> {
        Ok(self
            .read()?
            .files
            .iter()
            .find(|f| f.kb_id == kb_id && f.file_name == file_name)
            .map(|f| f.slug.clone()))
    }

    async fn slug_exists(&self, kb_id: KbId, slug: &str) -> Result<bool> {
        Ok(self
            .read()?
            .files
            .iter()
            .any(|f| f.kb_id == kb_id && f.slug == slug))
    }

    async fn list_files(&self, kb_id: KbId) -> Result<Vec<FileSummary>> {
        let mut files: Vec<FileSummary> = self
            .read()?
            .files
            .iter()
            .filter(|f| f.kb_id == kb_id)
            .map(|f| FileSummary {
                name: f.file_name.clone(),
                slug: f.slug.clone(),
            })
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn get_file(&self, kb_id: KbId, slug: &str) -> Result<Option<FileRecord>> {
        Ok(self
            .read()?
            .files
            .iter()
            .find(|f| f.kb_id == kb_id && f.slug == slug)
            .cloned())
    }

    async fn commit_file(&self, file: &FileRecord, chunks: &[Chunk]) -> Result<()> {
        // Validate everything before touching the tables so a failure leaves no trace.
        for c in chunks {
            check_dims(self.dims, &c.embedding)?;
        }
        let mut t = self.write()?;
        if t.files.iter().any(|f| {
            f.kb_id == file.kb_id && f.slug == file.slug && f.file_name != file.file_name
        }) {
            return Err(KbError::Store(format!(
                "slug {} already used in knowledge base {}",
                file.slug, file.kb_id
            )));
        }

        t.files
            .retain(|f| !(f.kb_id == file.kb_id && f.file_name == file.file_name));
        t.files.push(file.clone());

        t.chunks
            .retain(|c| !(c.kb_id == file.kb_id && c.file_name == file.file_name));
        t.chunks.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn insert_chunk(&self, chunk: &Chunk) -> Result<()> {
        check_dims(self.dims, &chunk.embedding)?;
        let mut t = self.write()?;
        if t.chunks.iter().any(|c| {
            c.kb_id == chunk.kb_id
                && c.file_name == chunk.file_name
                && c.chunk_index == chunk.chunk_index
        }) {
            return Err(KbError::Store(format!(
                "duplicate chunk {}#{}",
                chunk.file_name, chunk.chunk_index
            )));
        }
        t.chunks.push(chunk.clone());
        Ok(())
    }

    async fn chunks_for_file(&self, kb_id: KbId, file_name: &str) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> = self
            .read()?
            .chunks
            .iter()
            .filter(|c| c.kb_id == kb_id && c.file_name == file_name)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn nearest(&self, kb_id: KbId, query: &[f32], k: usize) -> Result<Vec<Chunk>> {
        check_dims(self.dims, query)?;
        let candidates: Vec<Chunk> = self
            .read()?
            .chunks
            .iter()
            .filter(|c| c.kb_id == kb_id)
            .cloned()
            .collect();
        Ok(rank_by_distance(candidates, query, k))
    }
}
