//! Chat completion provider implementations.
//!
//! [`OpenAIChat`] calls an OpenAI-compatible `POST /chat/completions`
//! endpoint through the shared retrying transport. [`DisabledChat`] fails
//! every request.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;

use kb_harness_core::chat::{ChatMessage, ChatProvider};

use crate::config::ChatConfig;
use crate::embedding::API_KEY_ENV;
use crate::http;

pub struct DisabledChat;

#[async_trait]
impl ChatProvider for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, String> {
        Err("chat provider is disabled".to_string())
    }
}

/// Chat provider for the OpenAI chat completions API and compatible servers.
pub struct OpenAIChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAIChat {
    pub fn new(config: &ChatConfig, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            url: http::endpoint(&config.base_url, "chat/completions"),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        let json =
            http::post_json_with_retry(&self.client, &self.url, &self.api_key, &body, self.max_retries)
                .await
                .map_err(|e| format!("{:#}", e))?;
        parse_completion(&json)
    }
}

/// Extract `choices[0].message.content` from a chat completion response.
pub fn parse_completion(json: &serde_json::Value) -> Result<String, String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| "invalid response: no completion choices".to_string())
}

/// Create the configured [`ChatProvider`].
pub fn create_chat_provider(config: &ChatConfig) -> anyhow::Result<Arc<dyn ChatProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => {
            let api_key = std::env::var(API_KEY_ENV)
                .map_err(|_| anyhow::anyhow!("{} environment variable not set", API_KEY_ENV))?;
            Ok(Arc::new(OpenAIChat::new(config, api_key)?))
        }
        other => bail!("Unknown chat provider: {}", other),
    }
}
