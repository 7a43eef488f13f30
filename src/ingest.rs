//! Ingestion pipeline orchestration.
//!
//! Turns one uploaded file into stored chunks:
//! extract → chunk → embed (every chunk) → commit (one transaction).
//!
//! Nothing is written until every chunk has an embedding, so a provider
//! failure part-way through a file leaves the knowledge base untouched.
//! Re-uploading a file name already present in the knowledge base reuses its
//! slug and replaces its bytes and chunks atomically.

use std::fmt;

use chrono::Utc;
use tracing::{info, warn};

use kb_harness_core::chunk::chunk_text;
use kb_harness_core::embedding::EmbeddingProvider;
use kb_harness_core::models::{Chunk, FileRecord, KbId};
use kb_harness_core::slug::{disambiguate, slugify};
use kb_harness_core::store::Store;
use kb_harness_core::{KbError, Result};

use crate::extract::{extract_text, DocumentKind};

/// Stage of a single file's ingestion job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestStage {
    Extracting,
    Chunking,
    /// `done` of `total` chunks embedded.
    Embedding { done: usize, total: usize },
    Committed { slug: String, chunks: usize },
    Failed { error: String },
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStage::Extracting => write!(f, "extracting"),
            IngestStage::Chunking => write!(f, "chunking"),
            IngestStage::Embedding { done, total } => write!(f, "embedding({}/{})", done, total),
            IngestStage::Committed { .. } => write!(f, "committed"),
            IngestStage::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Receives stage transitions for an ingestion job.
pub trait IngestProgress: Send + Sync {
    fn report(&self, kb_id: KbId, file_name: &str, stage: &IngestStage);
}

/// Logs every stage transition through `tracing`.
pub struct TracingProgress;

impl IngestProgress for TracingProgress {
    fn report(&self, kb_id: KbId, file_name: &str, stage: &IngestStage) {
        match stage {
            IngestStage::Failed { error } => {
                warn!(kb_id, file = file_name, stage = %stage, error = %error, "ingest")
            }
            IngestStage::Committed { slug, chunks } => {
                info!(kb_id, file = file_name, stage = %stage, slug = %slug, chunks, "ingest")
            }
            _ => info!(kb_id, file = file_name, stage = %stage, "ingest"),
        }
    }
}

/// Tunables for the pipeline, taken from `[chunking]` and `[embedding]`.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub max_chars: usize,
    pub embed_batch: usize,
}

/// One upload to ingest.
#[derive(Debug, Clone)]
pub struct Upload {
    pub kb_id: KbId,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IngestReport {
    pub slug: String,
    pub chunks: usize,
}

/// Pick the slug for `file_name` within `kb_id`.
///
/// 1. A file with the same name keeps its existing slug (the upload replaces it).
/// 2. Otherwise the slugified name is used if free.
/// 3. Otherwise a random suffix is appended.
pub async fn resolve_slug(store: &dyn Store, kb_id: KbId, file_name: &str) -> Result<String> {
    if let Some(existing) = store.find_file_by_name(kb_id, file_name).await? {
        return Ok(existing);
    }
    let candidate = slugify(file_name);
    if !store.slug_exists(kb_id, &candidate).await? {
        return Ok(candidate);
    }
    Ok(disambiguate(&candidate, &mut rand::thread_rng()))
}

/// Run the full pipeline for one upload.
///
/// The caller has already passed the access gate and validated the file name.
pub async fn ingest_file(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    settings: &IngestSettings,
    progress: &dyn IngestProgress,
    upload: Upload,
) -> Result<IngestReport> {
    let kb_id = upload.kb_id;
    let file_name = upload.file_name.clone();
    match run(store, embedder, settings, progress, upload).await {
        Ok(report) => {
            progress.report(
                kb_id,
                &file_name,
                &IngestStage::Committed {
                    slug: report.slug.clone(),
                    chunks: report.chunks,
                },
            );
            Ok(report)
        }
        Err(e) => {
            progress.report(
                kb_id,
                &file_name,
                &IngestStage::Failed {
                    error: e.to_string(),
                },
            );
            Err(e)
        }
    }
}

async fn run(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    settings: &IngestSettings,
    progress: &dyn IngestProgress,
    upload: Upload,
) -> Result<IngestReport> {
    let Upload {
        kb_id,
        file_name,
        mime_type,
        bytes,
    } = upload;

    progress.report(kb_id, &file_name, &IngestStage::Extracting);
    let kind = DocumentKind::from_file_name(&file_name)?;
    let text = extract_text(&bytes, kind)?;

    progress.report(kb_id, &file_name, &IngestStage::Chunking);
    let pieces = chunk_text(&text, settings.max_chars);

    let total = pieces.len();
    let mut embeddings = Vec::with_capacity(total);
    progress.report(kb_id, &file_name, &IngestStage::Embedding { done: 0, total });
    for batch in pieces.chunks(settings.embed_batch.max(1)) {
        let vectors = embedder.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(KbError::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        embeddings.extend(vectors);
        progress.report(
            kb_id,
            &file_name,
            &IngestStage::Embedding {
                done: embeddings.len(),
                total,
            },
        );
    }

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (content, embedding))| Chunk {
            kb_id,
            file_name: file_name.clone(),
            chunk_index: i as i64,
            content,
            embedding,
        })
        .collect();

    let slug = resolve_slug(store, kb_id, &file_name).await?;
    let record = FileRecord {
        kb_id,
        file_name,
        slug: slug.clone(),
        mime_type: mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_mime().to_string()),
        content: bytes,
        created_at: Utc::now(),
    };
    store.commit_file(&record, &chunks).await.map_err(|e| {
        if matches!(e, KbError::Store(_)) {
            warn!(kb_id, slug = %slug, error = %e, "commit failed; slug may have been taken concurrently");
        }
        e
    })?;

    Ok(IngestReport {
        slug,
        chunks: chunks.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_harness_core::embedding::StaticEmbeddings;
    use kb_harness_core::store::memory::InMemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<String>>);

    impl IngestProgress for RecordingProgress {
        fn report(&self, _kb_id: KbId, _file_name: &str, stage: &IngestStage) {
            self.0.lock().unwrap().push(stage.to_string());
        }
    }

    fn settings() -> IngestSettings {
        IngestSettings {
            max_chars: 11,
            embed_batch: 2,
        }
    }

    fn upload(kb_id: KbId, name: &str, body: &str) -> Upload {
        Upload {
            kb_id,
            file_name: name.to_string(),
            mime_type: None,
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_ingest_reports_stages_and_stores_chunks() {
        let store = InMemoryStore::new(2);
        let embedder = StaticEmbeddings::new(2);
        let progress = RecordingProgress::default();
        let report = ingest_file(
            &store,
            &embedder,
            &settings(),
            &progress,
            upload(1, "Notes.txt", "alpha beta gamma delta epsilon"),
        )
        .await
        .unwrap();

        assert_eq!(report.slug, "notes-txt");
        assert_eq!(report.chunks, 3);
        let chunks = store.chunks_for_file(1, "Notes.txt").await.unwrap();
        let indices: Vec<i64> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(
            store.get_file(1, "notes-txt").await.unwrap().unwrap().mime_type,
            "text/plain"
        );

        let stages = progress.0.lock().unwrap().clone();
        assert_eq!(
            stages,
            vec![
                "extracting",
                "chunking",
                "embedding(0/3)",
                "embedding(2/3)",
                "embedding(3/3)",
                "committed"
            ]
        );
    }

    #[tokio::test]
    async fn test_embedding_failure_persists_nothing() {
        let store = InMemoryStore::new(2);
        let embedder = StaticEmbeddings::new(2).failing_on("delta");
        let progress = RecordingProgress::default();
        let err = ingest_file(
            &store,
            &embedder,
            &settings(),
            &progress,
            upload(1, "a.txt", "alpha beta gamma delta epsilon"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, KbError::EmbeddingProvider(_)));
        assert!(store.list_files(1).await.unwrap().is_empty());
        assert!(store.chunks_for_file(1, "a.txt").await.unwrap().is_empty());
        assert_eq!(
            progress.0.lock().unwrap().last().map(String::as_str),
            Some("failed")
        );
    }

    #[tokio::test]
    async fn test_same_slug_different_names_are_disambiguated() {
        let store = InMemoryStore::new(2);
        let embedder = StaticEmbeddings::new(2);
        let a = ingest_file(&store, &embedder, &settings(), &TracingProgress, upload(1, "My File.txt", "x"))
            .await
            .unwrap();
        let b = ingest_file(&store, &embedder, &settings(), &TracingProgress, upload(1, "my-file.txt", "y"))
            .await
            .unwrap();
        assert_eq!(a.slug, "my-file-txt");
        assert_ne!(a.slug, b.slug);
        assert!(b.slug.starts_with("my-file-txt-"));
        assert_eq!(store.list_files(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reupload_same_name_replaces() {
        let store = InMemoryStore::new(2);
        let embedder = StaticEmbeddings::new(2);
        let first = ingest_file(
            &store,
            &embedder,
            &settings(),
            &TracingProgress,
            upload(1, "a.txt", "one two three four five six"),
        )
        .await
        .unwrap();
        let second = ingest_file(&store, &embedder, &settings(), &TracingProgress, upload(1, "a.txt", "short"))
            .await
            .unwrap();
        assert_eq!(first.slug, second.slug);
        let chunks = store.chunks_for_file(1, "a.txt").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "short");
        assert_eq!(
            store.get_file(1, &first.slug).await.unwrap().unwrap().content,
            b"short"
        );
    }

    #[tokio::test]
    async fn test_empty_file_is_stored_without_chunks() {
        let store = InMemoryStore::new(2);
        let embedder = StaticEmbeddings::new(2);
        let report = ingest_file(&store, &embedder, &settings(), &TracingProgress, upload(1, "empty.md", "   "))
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(embedder.calls().len(), 0);
        assert_eq!(store.list_files(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_utf8_is_format_error() {
        let store = InMemoryStore::new(2);
        let embedder = StaticEmbeddings::new(2);
        let mut up = upload(1, "bad.txt", "");
        up.bytes = vec![0xff, 0xfe];
        let err = ingest_file(&store, &embedder, &settings(), &TracingProgress, up)
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::DocumentFormat(_)));
        assert!(store.list_files(1).await.unwrap().is_empty());
    }
}
