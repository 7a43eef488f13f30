//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, pure helpers for vector serialization and distance, and
//! [`StaticEmbeddings`], a deterministic provider whose vectors are chosen
//! by the caller.
//!
//! Concrete network providers (OpenAI-compatible) live in the `kb-harness`
//! app crate.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{KbError, Result};

/// Trait for embedding providers.
///
/// One provider (and therefore one model and dimension) is used per
/// deployment, so every stored vector has length [`dims`](Self::dims).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a single text unit.
    ///
    /// Fails with [`KbError::EmbeddingProvider`] on transport or quota failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order.
    ///
    /// The default implementation calls [`embed`](Self::embed) once per text.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use kb_harness_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Euclidean (L2) distance between two vectors of equal length.
///
/// Callers are expected to have checked dimensions; extra trailing
/// components of the longer vector are ignored.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Fail with [`KbError::DimensionMismatch`] unless `vec.len() == expected`.
pub fn check_dims(expected: usize, vec: &[f32]) -> Result<()> {
    if vec.len() != expected {
        return Err(KbError::DimensionMismatch {
            expected,
            actual: vec.len(),
        });
    }
    Ok(())
}

/// Deterministic embedding provider returning caller-chosen vectors.
///
/// Texts registered with [`with_vector`](Self::with_vector) map to their
/// vector; everything else maps to the default vector. Every call is
/// recorded so tests can assert which texts were embedded.
pub struct StaticEmbeddings {
    dims: usize,
    default: Vec<f32>,
    vectors: HashMap<String, Vec<f32>>,
    fail_on: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StaticEmbeddings {
    /// Provider whose default vector is all zeros.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            default: vec![0.0; dims],
            vectors: HashMap::new(),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the vector returned for unregistered texts.
    pub fn with_default(mut self, vector: Vec<f32>) -> Self {
        self.default = vector;
        self
    }

    /// Map `text` to `vector`.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Fail with [`KbError::EmbeddingProvider`] whenever a text containing
    /// `needle` is embedded.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Texts embedded so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbeddings {
    fn model_name(&self) -> &str {
        "static"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }
        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                return Err(KbError::EmbeddingProvider(format!(
                    "static provider refused text containing {:?}",
                    needle
                )));
            }
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}
