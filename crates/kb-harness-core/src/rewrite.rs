//! Conversation-aware question rewriting.
//!
//! A follow-up like "what about the second one?" retrieves poorly on its
//! own. When prior turns exist, the chat provider folds history and question
//! into one standalone query, which is what gets embedded.

use crate::chat::{ChatMessage, ChatProvider};
use crate::error::{KbError, Result};

/// System instruction sent ahead of the history.
pub const REWRITE_INSTRUCTION: &str =
    "Rewrite the user's question to be a standalone question using the conversation history.";

/// Build the rewrite request: instruction, history verbatim, then the question.
pub fn rewrite_messages(history: &[ChatMessage], question: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(REWRITE_INSTRUCTION));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(question));
    messages
}

/// Rewrite `question` into a standalone query using `history`.
///
/// Callers skip this entirely when `history` is empty. A provider failure or
/// an empty completion is a [`KbError::Rewrite`]; there is no fallback to the
/// original question.
pub async fn rewrite_question(
    chat: &dyn ChatProvider,
    history: &[ChatMessage],
    question: &str,
) -> Result<String> {
    let messages = rewrite_messages(history, question);
    let rewritten = chat
        .complete(&messages)
        .await
        .map_err(KbError::Rewrite)?;
    let rewritten = rewritten.trim();
    if rewritten.is_empty() {
        return Err(KbError::Rewrite("provider returned an empty rewrite".into()));
    }
    Ok(rewritten.to_string())
}
