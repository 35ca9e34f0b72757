//! # docchat CLI
//!
//! The `docchat` binary is the primary interface for the pipeline. It
//! provides commands for database initialization, content extraction,
//! ingestion, embedding management, retrieval, question answering, the
//! interactive chat, and the HTTP chat server.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and run schema migrations |
//! | `docchat extract <pdf>` | Dump extracted text/tables/image-OCR without indexing |
//! | `docchat ingest <pdf>` | Full pipeline: extract, chunk, embed, index |
//! | `docchat embed pending` | Backfill missing or stale embeddings |
//! | `docchat embed rebuild` | Delete and regenerate all embeddings |
//! | `docchat search "<query>"` | Show the top-k retrieved chunks |
//! | `docchat ask "<question>"` | One-shot answer with source citations |
//! | `docchat chat` | Interactive chat over the indexed document |
//! | `docchat serve` | Start the JSON HTTP chat server |
//! | `docchat stats` | Index statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::{chat, config, embed_cmd, export, ingest, retrieve, server, stats, store};

/// docchat — chat with your PDF from the terminal.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — a local-first chat-with-your-PDF pipeline",
    version,
    long_about = "docchat extracts text, tables, and image OCR from a PDF, chunks and embeds \
    the content into a SQLite-backed vector index, and answers natural-language questions \
    about the document through a hosted LLM, with page-level source citations."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, embeddings, chunk_vectors). Idempotent.
    Init,

    /// Extract content from a PDF without indexing it.
    ///
    /// Runs the text, table, and image-OCR extractors and writes
    /// `all_content.json`, `all_content.txt`, and the extracted images
    /// to the output directory.
    Extract {
        /// Path to the PDF to extract.
        pdf: PathBuf,

        /// Output directory (defaults to the configured artifacts dir).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Ingest a PDF: extract, chunk, embed, and index.
    ///
    /// Re-ingesting the same file replaces everything previously indexed
    /// from it. Embedding failures are non-fatal; run `embed pending`
    /// afterwards to backfill.
    Ingest {
        /// Path to the PDF to ingest.
        pdf: PathBuf,

        /// Show extraction and chunk counts without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Skip embedded-image extraction and OCR.
        #[arg(long)]
        skip_images: bool,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Show the top-k chunks retrieved for a query.
    ///
    /// Useful for inspecting what context the answer generator would see.
    Search {
        /// The search query string.
        query: String,

        /// Number of chunks to return (defaults to retrieval.top_k).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Ask one question and print the answer with source citations.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve (defaults to retrieval.top_k).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Interactive chat over the indexed document.
    ///
    /// Supports `/clear`, `/export [path]`, and `/help`; `quit` exits.
    Chat,

    /// Start the JSON HTTP chat server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// load/ask/history/clear/export session endpoints.
    Serve,

    /// Show index statistics.
    Stats,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed chunks that are missing or have stale embeddings.
    Pending {
        /// Maximum number of chunks to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete and regenerate all embeddings.
    ///
    /// Useful when switching embedding models or dimensions.
    Rebuild {
        /// Override the batch size from config.
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            store::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Extract { pdf, out } => {
            export::run_extract(&cfg, &pdf, out.as_deref()).await?;
        }
        Commands::Ingest {
            pdf,
            dry_run,
            skip_images,
        } => {
            ingest::run_ingest(&cfg, &pdf, dry_run, skip_images).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
            EmbedAction::Rebuild { batch_size } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size).await?;
            }
        },
        Commands::Search { query, k } => {
            retrieve::run_search(&cfg, &query, k).await?;
        }
        Commands::Ask { question, k } => {
            chat::run_ask(&cfg, &question, k).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
