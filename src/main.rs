//! # ClauseLens CLI (`lens`)
//!
//! Processes rental agreements, flags missing standard clauses, answers
//! questions grounded in the document, and discovers the standard clause
//! set from a corpus of sample agreements.
//!
//! ## Usage
//!
//! ```bash
//! lens --config ./config/lens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lens chunk <file>` | Print the word-window fragments of a document |
//! | `lens process <file>` | Chunk, embed, and check a document for missing clauses |
//! | `lens ask "<question>" --store DIR` | Answer from a saved vector store |
//! | `lens clauses` | List the reference clause file |
//! | `lens discover` | Rebuild the reference clause file from a corpus |
//! | `lens serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Check an agreement and keep its index for questions
//! lens process lease.pdf --summary --save ./store/lease
//!
//! # Ask about it later
//! lens ask "When is rent due?" --store ./store/lease
//!
//! # Preview discovery without touching the clause file
//! lens discover --dataset ./dataset --dry-run
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use clauselens::{commands, config, discover, server};

/// ClauseLens CLI: missing-clause detection and grounded Q&A for legal agreements.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lens.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lens",
    about = "ClauseLens: missing-clause detection and grounded Q&A for legal agreements",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lens.toml`.
    #[arg(long, global = true, default_value = "./config/lens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fragments a document is split into.
    Chunk {
        /// PDF, DOCX, or text file.
        file: PathBuf,

        /// Words per fragment (overrides `[chunking].size`).
        #[arg(long)]
        size: Option<usize>,
    },

    /// Process a document: chunk, embed, and check for missing clauses.
    Process {
        /// PDF, DOCX, or text file.
        file: PathBuf,

        /// Also generate a plain-language summary.
        #[arg(long)]
        summary: bool,

        /// Save the document's vector store to this directory.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Answer a question from a saved vector store.
    Ask {
        question: String,

        /// Directory written by `lens process --save`.
        #[arg(long)]
        store: PathBuf,
    },

    /// List the reference clauses.
    Clauses,

    /// Discover reference clauses from a corpus of agreements.
    ///
    /// Writes the clause file configured in `[discovery].output` (or
    /// `[clauses].path`), backing up the previous version first.
    Discover {
        /// Corpus directory (overrides `[discovery].dataset`).
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Report what would be written without writing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the HTTP server.
    Serve,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,clauselens=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chunk { file, size } => {
            commands::run_chunk(&cfg, &file, size)?;
        }
        Commands::Process {
            file,
            summary,
            save,
        } => {
            commands::run_process(&cfg, &file, summary, save.as_deref()).await?;
        }
        Commands::Ask { question, store } => {
            commands::run_ask(&cfg, &question, &store).await?;
        }
        Commands::Clauses => {
            commands::run_clauses(&cfg)?;
        }
        Commands::Discover { dataset, dry_run } => {
            discover::run_discover(&cfg, dataset.as_deref(), dry_run).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
