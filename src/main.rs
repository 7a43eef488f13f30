//! # kb-harness CLI (`kbh`)
//!
//! ## Usage
//!
//! ```bash
//! kbh --config ./config/kbh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbh init` | Create the SQLite database and run schema migrations |
//! | `kbh serve` | Start the HTTP API |
//! | `kbh user add <email>` | Register a user and print a bearer token |
//! | `kbh kb create <name> --user <id>` | Create a knowledge base |
//! | `kbh kb list --user <id>` | List a user's knowledge bases |
//! | `kbh upload <kb_id> <path> --user <id>` | Ingest a .txt, .md, or .pdf file |
//! | `kbh files <kb_id> --user <id>` | List files in a knowledge base |
//! | `kbh ask <kb_id> "<question>" --user <id>` | Ask a question |
//!
//! ## Examples
//!
//! ```bash
//! kbh init
//! kbh user add alice@example.com
//! kbh kb create handbook --user 1
//! kbh upload 1 ./docs/onboarding.pdf --user 1
//! kbh ask 1 "How do I request leave?" --user 1
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kb_harness::{commands, config, migrate, server};

/// kb-harness: multi-tenant knowledge bases with retrieval-augmented answers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kbh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kbh",
    about = "kb-harness: upload documents into knowledge bases and ask questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbh.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (users, knowledge_bases, files, chunks). Safe to run repeatedly.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage knowledge bases.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Upload a file into a knowledge base.
    ///
    /// Re-uploading a file with the same name replaces its content and chunks.
    Upload {
        /// Knowledge base id.
        kb_id: i64,
        /// Path to a .txt, .md, or .pdf file.
        path: PathBuf,
        /// Acting user id.
        #[arg(long)]
        user: i64,
    },

    /// List files in a knowledge base.
    Files {
        /// Knowledge base id.
        kb_id: i64,
        /// Acting user id.
        #[arg(long)]
        user: i64,
    },

    /// Ask a question against a knowledge base.
    Ask {
        /// Knowledge base id.
        kb_id: i64,
        /// The question.
        question: String,
        /// Acting user id.
        #[arg(long)]
        user: i64,
        /// JSON file with prior turns: `[{"role": "user", "content": "..."}]`.
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user and print a bearer token for the HTTP API.
    Add {
        email: String,
        /// Opaque password hash from the credential service.
        #[arg(long)]
        password_hash: Option<String>,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// Create a knowledge base owned by `--user`.
    Create {
        name: String,
        #[arg(long)]
        user: i64,
    },
    /// List knowledge bases owned by `--user`.
    List {
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging on stderr so stdout stays parseable
    let filter = if cli.verbose {
        "kb_harness=debug,kb_harness_core=debug,tower_http=debug"
    } else {
        "kb_harness=info,kb_harness_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::User { action } => match action {
            UserAction::Add {
                email,
                password_hash,
            } => {
                commands::run_user_add(&cfg, &email, password_hash.as_deref()).await?;
            }
        },
        Commands::Kb { action } => match action {
            KbAction::Create { name, user } => {
                commands::run_kb_create(&cfg, user, &name).await?;
            }
            KbAction::List { user } => {
                commands::run_kb_list(&cfg, user).await?;
            }
        },
        Commands::Upload { kb_id, path, user } => {
            commands::run_upload(&cfg, user, kb_id, &path).await?;
        }
        Commands::Files { kb_id, user } => {
            commands::run_files(&cfg, user, kb_id).await?;
        }
        Commands::Ask {
            kb_id,
            question,
            user,
            history,
        } => {
            commands::run_ask(&cfg, user, kb_id, &question, history.as_deref()).await?;
        }
    }

    Ok(())
}
