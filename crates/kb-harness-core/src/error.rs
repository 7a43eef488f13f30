//! Error taxonomy for knowledge-base operations.
//!
//! Every failure path returns one of these kinds so the boundary layer can
//! map it to a status code without inspecting message text.

use thiserror::Error;

/// Errors produced by the ingestion and query pipelines and the access gate.
#[derive(Error, Debug)]
pub enum KbError {
    /// Missing or malformed request fields. No side effects.
    #[error("validation error: {0}")]
    Validation(String),

    /// No caller identity was supplied.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The caller does not own the target knowledge base.
    #[error("forbidden")]
    Forbidden,

    /// The target knowledge base or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The uploaded bytes are not a well-formed document of the declared type.
    #[error("document format error: {0}")]
    DocumentFormat(String),

    /// The embedding provider failed (transport, quota, malformed response).
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The chat provider failed while rewriting a follow-up question.
    #[error("question rewrite failed: {0}")]
    Rewrite(String),

    /// The chat provider failed while generating the answer.
    #[error("answer synthesis failed: {0}")]
    Synthesis(String),

    /// Persistence fault.
    #[error("store error: {0}")]
    Store(String),

    /// A vector's length differs from the configured embedding dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl KbError {
    /// Short machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            KbError::Validation(_) => "bad_request",
            KbError::Unauthenticated => "unauthenticated",
            KbError::Forbidden => "forbidden",
            KbError::NotFound(_) => "not_found",
            KbError::DocumentFormat(_) => "document_format",
            KbError::EmbeddingProvider(_) => "embedding_failed",
            KbError::Rewrite(_) => "rewrite_failed",
            KbError::Synthesis(_) => "synthesis_failed",
            KbError::Store(_) => "store_error",
            KbError::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

/// Result alias for knowledge-base operations.
pub type Result<T> = std::result::Result<T, KbError>;
