//! Chat completion provider trait.
//!
//! The query pipeline needs exactly one operation from a language model:
//! turn an ordered list of messages into a completion. Any vendor, or the
//! [`ScriptedChat`] double, satisfies [`ChatProvider`].

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Roles accepted in client-supplied conversation history.
pub const HISTORY_ROLES: &[&str] = &["user", "assistant", "system"];

/// Trait for chat completion providers.
///
/// Errors are returned as plain messages; the caller decides which
/// [`KbError`](crate::KbError) kind a failure maps to (rewrite vs. synthesis).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Return the text of the first completion for `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, String>;
}

/// Deterministic chat provider for tests.
///
/// Pops replies from a queue, falling back to a fixed reply, and records
/// every request it receives.
pub struct ScriptedChat {
    fallback: Option<String>,
    queued: Mutex<Vec<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    /// Always answer with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            queued: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request.
    pub fn failing() -> Self {
        Self {
            fallback: None,
            queued: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer the next requests with `replies`, in order, before using the fallback.
    pub fn then(self, replies: &[&str]) -> Self {
        if let Ok(mut q) = self.queued.lock() {
            q.extend(replies.iter().rev().map(|s| s.to_string()));
        }
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<Vec<ChatMessage>> {
        self.requests().pop()
    }
}

#[async_trait]
impl ChatProvider for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, String> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
        if let Some(next) = self.queued.lock().ok().and_then(|mut q| q.pop()) {
            return Ok(next);
        }
        self.fallback
            .clone()
            .ok_or_else(|| "scripted provider failure".to_string())
    }
}
