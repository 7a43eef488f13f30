//! CLI command implementations.
//!
//! Each `run_*` function backs one `kbh` subcommand and prints
//! human-readable output to stdout. The CLI acts as the user named by
//! `--user`; it goes through the same access gate as the HTTP API.

use anyhow::{Context, Result};
use std::path::Path;

use kb_harness_core::chat::ChatMessage;
use kb_harness_core::models::{KbId, UserId};
use kb_harness_core::store::Store;

use crate::auth::HmacTokenAuthenticator;
use crate::config::Config;
use crate::service::KnowledgeService;
use crate::sqlite_store::SqliteStore;

/// Register a user and print its id and a bearer token.
pub async fn run_user_add(config: &Config, email: &str, password_hash: Option<&str>) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        anyhow::bail!("email must not be empty");
    }
    let store = SqliteStore::open(config).await?;
    let user = store.create_user(email, password_hash.unwrap_or("")).await?;
    println!("user {} created: {}", user.id, user.email);

    match config.auth.resolve_secret() {
        Ok(secret) => {
            let auth = HmacTokenAuthenticator::new(secret)?;
            println!("token: {}", auth.issue(user.id));
        }
        Err(e) => println!("no token issued: {}", e),
    }
    Ok(())
}

pub async fn run_kb_create(config: &Config, user: UserId, name: &str) -> Result<()> {
    let service = KnowledgeService::from_config(config).await?;
    let kb = service.create_kb(Some(user), name).await?;
    println!("knowledge base {} created: {}", kb.id, kb.name);
    Ok(())
}

pub async fn run_kb_list(config: &Config, user: UserId) -> Result<()> {
    let service = KnowledgeService::from_config(config).await?;
    let kbs = service.list_kbs(Some(user)).await?;
    if kbs.is_empty() {
        println!("No knowledge bases.");
        return Ok(());
    }
    for kb in kbs {
        println!(
            "{:>6}  {}  (created {})",
            kb.id,
            kb.name,
            kb.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn run_upload(config: &Config, user: UserId, kb_id: KbId, path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", path.display()))?;

    let service = KnowledgeService::from_config(config).await?;
    let report = service
        .upload_file(Some(user), kb_id, file_name, None, bytes)
        .await?;
    println!("uploaded {} as {} ({} chunks)", file_name, report.slug, report.chunks);
    Ok(())
}

pub async fn run_files(config: &Config, user: UserId, kb_id: KbId) -> Result<()> {
    let service = KnowledgeService::from_config(config).await?;
    let files = service.list_files(Some(user), kb_id).await?;
    if files.is_empty() {
        println!("No files.");
        return Ok(());
    }
    for f in files {
        println!("{}  {}", f.slug, f.name);
    }
    Ok(())
}

/// Ask a question; `history` is an optional JSON file of `[{role, content}]`.
pub async fn run_ask(
    config: &Config,
    user: UserId,
    kb_id: KbId,
    question: &str,
    history: Option<&Path>,
) -> Result<()> {
    let history: Vec<ChatMessage> = match history {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| "Failed to parse history JSON")?
        }
        None => Vec::new(),
    };

    let service = KnowledgeService::from_config(config).await?;
    let answer = service.ask(Some(user), kb_id, question, &history).await?;

    println!("{}", answer.answer);
    if !answer.chunks.is_empty() {
        println!();
        println!("Sources:");
        for c in &answer.chunks {
            println!("  {}#{}", c.file_name, c.index);
        }
    }
    Ok(())
}
