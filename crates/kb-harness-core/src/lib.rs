//! # kb-harness core
//!
//! Shared, runtime-agnostic logic for kb-harness: data models, chunking,
//! slug derivation, the embedding and chat provider traits, the store
//! abstraction, the per-tenant access gate, question rewriting, and answer
//! synthesis.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Concrete providers and the SQLite store live in the `kb-harness` app crate.

pub mod access;
pub mod answer;
pub mod chat;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod rewrite;
pub mod slug;
pub mod store;

pub use error::{KbError, Result};
