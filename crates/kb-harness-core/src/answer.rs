//! Answer synthesis from retrieved context.

use crate::chat::{ChatMessage, ChatProvider};
use crate::error::{KbError, Result};
use crate::models::{Answer, RetrievedChunk};

/// System message for answer generation.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Separator placed between retrieved chunks in the prompt.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Build the user prompt: chunk contents in retrieval order, then the question.
pub fn build_prompt(chunks: &[RetrievedChunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    format!(
        "Answer the question based on the following context:\n\n{}\n\nQuestion: {}",
        context, question
    )
}

/// Ask the chat provider to answer `question` from `chunks` only.
///
/// `question` must be the user's original wording, not the rewritten
/// retrieval query. The returned [`Answer`] carries the chunks used.
pub async fn synthesize(
    chat: &dyn ChatProvider,
    chunks: Vec<RetrievedChunk>,
    question: &str,
) -> Result<Answer> {
    let messages = [
        ChatMessage::system(ANSWER_SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(&chunks, question)),
    ];
    let answer = chat
        .complete(&messages)
        .await
        .map_err(KbError::Synthesis)?;
    Ok(Answer { answer, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ScriptedChat;

    fn rc(file: &str, index: i64, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            file_name: file.to_string(),
            index,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_prompt_keeps_order_and_separator() {
        let prompt = build_prompt(&[rc("a", 0, "alpha"), rc("b", 3, "bravo")], "why?");
        assert_eq!(
            prompt,
            "Answer the question based on the following context:\n\nalpha\n---\nbravo\n\nQuestion: why?"
        );
    }

    #[tokio::test]
    async fn test_synthesize_returns_answer_and_provenance() {
        let chat = ScriptedChat::replying("forty-two");
        let chunks = vec![rc("f.txt", 1, "the answer is 42")];
        let answer = synthesize(&chat, chunks.clone(), "what is it?").await.unwrap();
        assert_eq!(answer.answer, "forty-two");
        assert_eq!(answer.chunks, chunks);

        let sent = chat.last_request().unwrap();
        assert_eq!(sent[0].content, ANSWER_SYSTEM_PROMPT);
        assert!(sent[1].content.contains("the answer is 42"));
        assert!(sent[1].content.ends_with("Question: what is it?"));
    }

    #[tokio::test]
    async fn test_synthesize_failure() {
        let err = synthesize(&ScriptedChat::failing(), vec![], "q")
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::Synthesis(_)));
    }
}
