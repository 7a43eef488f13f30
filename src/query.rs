//! Query pipeline: rewrite (follow-ups only) → embed → nearest → synthesize.

use tracing::{debug, info};

use kb_harness_core::answer::synthesize;
use kb_harness_core::chat::{ChatMessage, ChatProvider};
use kb_harness_core::embedding::EmbeddingProvider;
use kb_harness_core::models::{Answer, KbId, RetrievedChunk};
use kb_harness_core::rewrite::rewrite_question;
use kb_harness_core::store::Store;
use kb_harness_core::Result;

/// Answer `question` from the `top_k` chunks of `kb_id` nearest to it.
///
/// With non-empty `history` the retrieval query is the rewritten standalone
/// question; the answer prompt always carries the original wording.
pub async fn answer_question(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    chat: &dyn ChatProvider,
    top_k: usize,
    kb_id: KbId,
    question: &str,
    history: &[ChatMessage],
) -> Result<Answer> {
    let retrieval_query = if history.is_empty() {
        question.to_string()
    } else {
        let rewritten = rewrite_question(chat, history, question).await?;
        debug!(kb_id, original = question, rewritten = %rewritten, "question rewritten");
        rewritten
    };

    let query_vec = embedder.embed(&retrieval_query).await?;
    let hits = store.nearest(kb_id, &query_vec, top_k).await?;
    info!(kb_id, hits = hits.len(), top_k, "retrieved context");

    let chunks: Vec<RetrievedChunk> = hits.iter().map(RetrievedChunk::from).collect();
    synthesize(chat, chunks, question).await
}
