//! # Answer Harness CLI (`anh`)
//!
//! The `anh` binary is the primary interface for Answer Harness. It provides
//! commands for database initialization, document ingestion, asking
//! questions, and starting the chat HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! anh --config ./config/anh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `anh init` | Create the SQLite database and run schema migrations |
//! | `anh ingest <file>` | Ingest a document's extracted text for a tenant |
//! | `anh ask "<question>"` | Answer a question from a tenant's corpus |
//! | `anh serve` | Start the chat HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! anh init --config ./config/anh.toml
//!
//! # Ingest extracted document text
//! anh ingest ./food-bank.txt --tenant acme --title "Food bank flyer"
//!
//! # Ask, non-streaming
//! anh ask "who can help with rent?" --tenant acme
//!
//! # Ask with incremental output
//! anh ask "who can help with rent?" --tenant acme --stream
//!
//! # Start the chat API
//! anh serve --config ./config/anh.toml
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;

use answer_harness::answer::Synthesizer;
use answer_harness::config::load_config;
use answer_harness::db;
use answer_harness::embedding::create_embedder;
use answer_harness::ingest::{build_vocabulary, ingest_document};
use answer_harness::llm::create_backend;
use answer_harness::migrate;
use answer_harness::server::{run_server, AppState, PassthroughVerifier};
use answer_harness::store_sqlite::{DocumentRecord, SqlitePassageStore};
use answer_harness::stream::answer_stream;

use answer_harness_core::models::StreamFrame;
use answer_harness_core::retrieve::Retriever;

/// Answer Harness CLI: a multi-tenant retrieval-augmented document
/// question-answering service.
#[derive(Parser)]
#[command(
    name = "anh",
    about = "Answer Harness — multi-tenant retrieval-augmented document question answering",
    version,
    long_about = "Answer Harness ingests documents per tenant, embeds them into a vector store, \
    and answers natural-language questions from the retrieved passages, with structured field \
    extraction and optional incremental streaming."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/anh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents/passages tables.
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Ingest a document's extracted text for a tenant.
    ///
    /// The file is read as plain text (format extraction happens upstream),
    /// normalized, chunked, embedded, and stored under a fresh document id.
    Ingest {
        /// Path to the extracted text file.
        file: PathBuf,

        /// Tenant that owns the document.
        #[arg(long)]
        tenant: String,

        /// Optional human-readable title.
        #[arg(long)]
        title: Option<String>,
    },

    /// Answer a question from a tenant's corpus.
    Ask {
        /// The natural-language question.
        question: String,

        /// Tenant whose corpus is searched.
        #[arg(long)]
        tenant: String,

        /// Number of passages to retrieve (defaults to config).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the answer incrementally as it is synthesized.
        #[arg(long)]
        stream: bool,
    },

    /// Start the chat HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            println!("init");
            println!("  database: {}", config.db.path.display());
            println!("ok");
        }

        Commands::Ingest {
            file,
            tenant,
            title,
        } => {
            let raw_text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let vocabulary = build_vocabulary(&config)?;
            let embedder = create_embedder(&config.embedding)?;
            let pool = db::connect(&config.db).await?;
            let store = SqlitePassageStore::new(pool);

            let outcome = ingest_document(
                &config,
                &vocabulary,
                embedder.as_ref(),
                &store,
                &tenant,
                title.as_deref(),
                &raw_text,
            )
            .await?;

            store
                .record_document(&DocumentRecord {
                    id: outcome.document_id.clone(),
                    tenant_id: tenant.clone(),
                    title,
                    created_at: chrono::Utc::now().timestamp(),
                    word_count: outcome.word_count as i64,
                })
                .await?;

            println!("ingest {}", file.display());
            println!("  tenant: {}", tenant);
            println!("  document: {}", outcome.document_id);
            println!("  words: {}", outcome.word_count);
            println!("  chunks written: {}", outcome.chunk_count);
            println!("  normalized: {}", outcome.normalized);
            println!("ok");
        }

        Commands::Ask {
            question,
            tenant,
            top_k,
            stream,
        } => {
            let vocabulary = build_vocabulary(&config)?;
            let embedder = create_embedder(&config.embedding)?;
            let pool = db::connect(&config.db).await?;
            let store = Arc::new(SqlitePassageStore::new(pool));

            let mut params = config.retrieval.to_params();
            if let Some(k) = top_k {
                params.top_k = k;
            }

            let retriever = Arc::new(Retriever::new(embedder, store, vocabulary, params));
            let synthesizer = Arc::new(Synthesizer::new(
                create_backend(&config.llm)?,
                config.llm.persona.clone(),
            ));

            if stream {
                let frames = answer_stream(
                    retriever,
                    synthesizer,
                    question,
                    tenant,
                    uuid::Uuid::new_v4().to_string(),
                );
                futures_util::pin_mut!(frames);

                while let Some(frame) = frames.next().await {
                    match frame {
                        StreamFrame::Chunk { content } => {
                            print!("{content}");
                            std::io::stdout().flush().ok();
                        }
                        StreamFrame::Complete { sources, .. } => {
                            println!();
                            println!("({} source passages)", sources.len());
                        }
                        StreamFrame::Error { message } => {
                            anyhow::bail!("{message}");
                        }
                    }
                }
            } else {
                let passages = retriever
                    .retrieve(&question, &tenant)
                    .await
                    .context("retrieval failed")?;
                let answer = synthesizer.synthesize(&question, &passages).await;
                println!("{}", answer.text);
                println!();
                println!("({} source passages)", answer.sources.len());
            }
        }

        Commands::Serve => {
            let vocabulary = build_vocabulary(&config)?;
            let embedder = create_embedder(&config.embedding)?;
            let pool = db::connect(&config.db).await?;
            let store = Arc::new(SqlitePassageStore::new(pool));

            let retriever = Arc::new(Retriever::new(
                embedder,
                store,
                vocabulary,
                config.retrieval.to_params(),
            ));
            let synthesizer = Arc::new(Synthesizer::new(
                create_backend(&config.llm)?,
                config.llm.persona.clone(),
            ));

            let state = AppState {
                config: Arc::new(config),
                retriever,
                synthesizer,
                verifier: Arc::new(PassthroughVerifier),
            };

            run_server(state).await?;
        }
    }

    Ok(())
}
