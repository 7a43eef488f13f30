//! # kb-harness
//!
//! Owned knowledge bases with document ingestion and retrieval-augmented
//! question answering.
//!
//! Users upload text, Markdown, and PDF files into knowledge bases they own.
//! Each file is extracted, chunked, embedded, and stored in SQLite. Questions
//! are answered by a chat model from the nearest chunks, with follow-up
//! questions rewritten into standalone queries first.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────┐
//! │  Upload  │──▶│ Extract→Chunk→Embed  │──▶│  SQLite  │
//! └──────────┘   └──────────────────────┘   └────┬─────┘
//!                                                │ nearest(k)
//! ┌──────────┐   ┌──────────────────────┐        │
//! │ Question │──▶│ Rewrite→Embed        │────────┤
//! └──────────┘   └──────────────────────┘        ▼
//!                                          ┌──────────┐
//!                                          │Synthesize│
//!                                          └──────────┘
//! ```
//!
//! Models, chunking, slugs, provider traits, the store trait, the access
//! gate, rewriting, and synthesis live in `kb_harness_core`. This crate
//! supplies the concrete pieces around them.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the store trait |
//! | [`extract`] | Text extraction (txt, md, pdf) |
//! | [`http`] | Retrying transport for provider APIs |
//! | [`embedding`] | Embedding providers |
//! | [`chat`] | Chat completion providers |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Question answering pipeline |
//! | [`service`] | Access-gated facade |
//! | [`auth`] | Caller authentication |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod auth;
pub mod chat;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod query;
pub mod server;
pub mod service;
pub mod sqlite_store;
