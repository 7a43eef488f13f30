//! Access-gated facade over the ingestion and query pipelines.
//!
//! [`KnowledgeService`] is what the HTTP server and CLI call. Every
//! operation on an existing knowledge base runs the access gate first, then
//! request validation, then the pipeline.

use std::sync::Arc;

use kb_harness_core::access::require_owner;
use kb_harness_core::chat::{ChatMessage, ChatProvider, HISTORY_ROLES};
use kb_harness_core::embedding::EmbeddingProvider;
use kb_harness_core::models::{Answer, FileRecord, FileSummary, KbId, KnowledgeBase, UserId};
use kb_harness_core::store::Store;
use kb_harness_core::{KbError, Result};
use tracing::info;

use crate::chat::create_chat_provider;
use crate::config::Config;
use crate::embedding::create_embedding_provider;
use crate::extract::DocumentKind;
use crate::ingest::{self, IngestProgress, IngestReport, IngestSettings, TracingProgress, Upload};
use crate::query;
use crate::sqlite_store::SqliteStore;

/// Limits and tunables for the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub max_chars: usize,
    pub embed_batch: usize,
    pub top_k: usize,
    pub max_upload_bytes: usize,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chars: config.chunking.max_chars,
            embed_batch: config.embedding.batch_size,
            top_k: config.retrieval.top_k,
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            embed_batch: 64,
            top_k: 5,
            max_upload_bytes: 10 << 20,
        }
    }
}

#[derive(Clone)]
pub struct KnowledgeService {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    progress: Arc<dyn IngestProgress>,
    settings: ServiceSettings,
}

impl KnowledgeService {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            progress: Arc::new(TracingProgress),
            settings,
        }
    }

    /// Build the service from configuration: SQLite store plus configured providers.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = SqliteStore::open(config).await?;
        let embedder = create_embedding_provider(&config.embedding)?;
        let chat = create_chat_provider(&config.chat)?;
        if embedder.dims() != store.dims() {
            anyhow::bail!(
                "embedding provider dims {} differ from store dims {}",
                embedder.dims(),
                store.dims()
            );
        }
        Ok(Self::new(
            Arc::new(store),
            embedder,
            chat,
            ServiceSettings::from_config(config),
        ))
    }

    pub fn with_progress(mut self, progress: Arc<dyn IngestProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Create a knowledge base owned by the caller.
    pub async fn create_kb(&self, caller: Option<UserId>, name: &str) -> Result<KnowledgeBase> {
        let owner = caller.ok_or(KbError::Unauthenticated)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(KbError::Validation("name is required".to_string()));
        }
        let kb = self.store.create_kb(owner, name).await?;
        info!(kb_id = kb.id, owner, name, "knowledge base created");
        Ok(kb)
    }

    /// Knowledge bases owned by the caller.
    pub async fn list_kbs(&self, caller: Option<UserId>) -> Result<Vec<KnowledgeBase>> {
        let owner = caller.ok_or(KbError::Unauthenticated)?;
        self.store.list_kbs(owner).await
    }

    pub async fn list_files(&self, caller: Option<UserId>, kb_id: KbId) -> Result<Vec<FileSummary>> {
        require_owner(self.store.as_ref(), caller, kb_id).await?;
        self.store.list_files(kb_id).await
    }

    /// Ingest one uploaded file, replacing any file with the same name.
    pub async fn upload_file(
        &self,
        caller: Option<UserId>,
        kb_id: KbId,
        file_name: &str,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<IngestReport> {
        require_owner(self.store.as_ref(), caller, kb_id).await?;
        let file_name = clean_file_name(file_name)?;
        if bytes.len() > self.settings.max_upload_bytes {
            return Err(KbError::Validation(format!(
                "file exceeds upload limit of {} bytes",
                self.settings.max_upload_bytes
            )));
        }
        let settings = IngestSettings {
            max_chars: self.settings.max_chars,
            embed_batch: self.settings.embed_batch,
        };
        ingest::ingest_file(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &settings,
            self.progress.as_ref(),
            Upload {
                kb_id,
                file_name,
                mime_type,
                bytes,
            },
        )
        .await
    }

    /// Raw bytes and MIME type of a stored file.
    pub async fn download_file(
        &self,
        caller: Option<UserId>,
        kb_id: KbId,
        slug: &str,
    ) -> Result<FileRecord> {
        require_owner(self.store.as_ref(), caller, kb_id).await?;
        self.store
            .get_file(kb_id, slug)
            .await?
            .ok_or_else(|| KbError::NotFound(format!("file {}", slug)))
    }

    /// Answer a question from the knowledge base, optionally as a follow-up.
    pub async fn ask(
        &self,
        caller: Option<UserId>,
        kb_id: KbId,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<Answer> {
        require_owner(self.store.as_ref(), caller, kb_id).await?;
        let question = question.trim();
        if question.is_empty() {
            return Err(KbError::Validation("question is required".to_string()));
        }
        validate_history(history)?;
        query::answer_question(
            self.store.as_ref(),
            self.embedder.as_ref(),
            self.chat.as_ref(),
            self.settings.top_k,
            kb_id,
            question,
            history,
        )
        .await
    }
}

/// Strip any client-side directory components and check the extension.
fn clean_file_name(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        return Err(KbError::Validation("file name is required".to_string()));
    }
    DocumentKind::from_file_name(name)?;
    Ok(name.to_string())
}

fn validate_history(history: &[ChatMessage]) -> Result<()> {
    for (i, message) in history.iter().enumerate() {
        if !HISTORY_ROLES.contains(&message.role.as_str()) {
            return Err(KbError::Validation(format!(
                "history[{}]: unknown role '{}'",
                i, message.role
            )));
        }
    }
    Ok(())
}
