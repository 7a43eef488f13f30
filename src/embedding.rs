//! Embedding provider implementations.
//!
//! Concrete backends for [`EmbeddingProvider`]:
//! - **[`DisabledEmbeddings`]**: always fails; used when `embedding.provider = "disabled"`.
//! - **[`OpenAIEmbeddings`]**: calls an OpenAI-compatible `POST /embeddings`
//!   endpoint with batching, retry, and backoff (see [`crate::http`]).
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use kb_harness::config::EmbeddingConfig;
//! # use kb_harness::embedding::create_embedding_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_embedding_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tracing::debug;

use kb_harness_core::embedding::{check_dims, EmbeddingProvider};
use kb_harness_core::{KbError, Result};

use crate::config::EmbeddingConfig;
use crate::http;

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// A provider that refuses every request.
pub struct DisabledEmbeddings {
    dims: usize,
}

impl DisabledEmbeddings {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(KbError::EmbeddingProvider(
            "embedding provider is disabled".to_string(),
        ))
    }
}

/// Embedding provider for the OpenAI embeddings API and compatible servers.
pub struct OpenAIEmbeddings {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAIEmbeddings {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            url: http::endpoint(&config.base_url, "embeddings"),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json =
            http::post_json_with_retry(&self.client, &self.url, &self.api_key, &body, self.max_retries)
                .await
                .map_err(|e| KbError::EmbeddingProvider(format!("{:#}", e)))?;
        let vectors = parse_openai_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(KbError::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for v in &vectors {
            check_dims(self.dims, v)?;
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KbError::EmbeddingProvider("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, size = batch.len(), "embedding batch");
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by each item's `index`
/// when present.
pub fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            KbError::EmbeddingProvider("invalid response: missing data array".to_string())
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                KbError::EmbeddingProvider("invalid response: missing embedding".to_string())
            })?;
        let vec = embedding
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    KbError::EmbeddingProvider("invalid response: non-numeric value".to_string())
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    // Sort by index to ensure order matches input
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbeddings`] |
/// | `"openai"` | [`OpenAIEmbeddings`] (requires `OPENAI_API_KEY`) |
pub fn create_embedding_provider(
    config: &EmbeddingConfig,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbeddings::new(config.dims))),
        "openai" => {
            let api_key = std::env::var(API_KEY_ENV)
                .map_err(|_| anyhow::anyhow!("{} environment variable not set", API_KEY_ENV))?;
            Ok(Arc::new(OpenAIEmbeddings::new(config, api_key)?))
        }
        other => bail!("Unknown embedding provider: {}", other),
    }
}
