//! # Knowledge Brain CLI (`kb`)
//!
//! The `kb` binary is the primary interface for the knowledge assistant. It
//! provides commands for serving the HTTP API, ingesting documents, asking
//! questions, saving notes, and inspecting a user's knowledge base.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb serve` | Start the HTTP API server |
//! | `kb ingest <file>` | Ingest a document into a user's knowledge base |
//! | `kb ask "<question>"` | Ask a question against stored knowledge |
//! | `kb remember "<note>"` | Append a note to the knowledge base (`/add`) |
//! | `kb status` | Show stored record and message counts for a user |
//!
//! ## Examples
//!
//! ```bash
//! # Start the server
//! kb serve --config ./config/kb.toml
//!
//! # Ingest a document for the default user
//! kb ingest ./notes/onboarding.md
//!
//! # Ask a grounded question
//! kb ask "What is our deployment cadence?" --user alice
//!
//! # Save a quick fact
//! kb remember "The staging VPN endpoint is vpn2.internal" --user alice
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use knowledge_brain::assistant::Assistant;
use knowledge_brain::embedding::create_embedder;
use knowledge_brain::llm::OpenAiCompatChat;
use knowledge_brain::memory::ConversationLog;
use knowledge_brain::store::VectorStore;
use knowledge_brain::users::{user_dir, validate_user_id};
use knowledge_brain::{load_config, server, Config};

/// Knowledge Brain CLI — a per-user document Q&A assistant backed by a
/// local vector store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kb.example.toml` for a full example. When the file
/// does not exist, built-in defaults apply.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "Knowledge Brain — a per-user document Q&A assistant backed by a local vector store",
    version,
    long_about = "Knowledge Brain ingests plain-text documents into per-user SQLite vector stores, \
    retrieves the most relevant passages by cosine similarity, and answers questions through an \
    OpenAI-compatible chat backend, grounded strictly in the stored knowledge."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kb.toml`. Built-in defaults apply for any
    /// section the file omits, or when the file is missing entirely.
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// `/upload`, `/ask`, and `/health`.
    Serve,

    /// Ingest a document into a user's knowledge base.
    ///
    /// Copies the file into the user's documents directory, chunks it,
    /// embeds the chunks, and stores the vectors. Re-ingesting the same
    /// file overwrites its previous records.
    Ingest {
        /// Path to a `.txt` or `.md` file.
        file: PathBuf,

        /// User whose knowledge base receives the document.
        #[arg(long, default_value = "default_user")]
        user: String,
    },

    /// Ask a question against stored knowledge.
    ///
    /// Retrieves the most relevant chunks, assembles them with recent
    /// conversation history, and prints the model's answer along with the
    /// source documents it drew from. Questions starting with `/add` are
    /// treated as notes and stored instead of answered.
    Ask {
        /// The question text.
        question: String,

        /// User whose knowledge base and conversation history to use.
        #[arg(long, default_value = "default_user")]
        user: String,
    },

    /// Append a note to a user's knowledge base.
    ///
    /// The note lands in `user_notes.txt` and the user's corpus is
    /// re-ingested so the note becomes retrievable immediately.
    Remember {
        /// The note text.
        note: String,

        /// User whose knowledge base receives the note.
        #[arg(long, default_value = "default_user")]
        user: String,
    },

    /// Show stored record and message counts for a user.
    Status {
        /// User to inspect.
        #[arg(long, default_value = "default_user")]
        user: String,
    },
}

/// Build the fully wired assistant from configuration. Requires the
/// embedding provider to be constructible and, for the chat side, the LLM
/// API key environment variable to be set.
fn build_assistant(config: Config) -> anyhow::Result<Arc<Assistant>> {
    let embedder = create_embedder(&config.embedding)?;
    let chat = Arc::new(OpenAiCompatChat::new(&config.llm)?);
    Ok(Arc::new(Assistant::new(config, embedder, chat)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "knowledge_brain=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let assistant = build_assistant(config)?;
            server::run_server(assistant).await?;
        }
        Commands::Ingest { file, user } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let source = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("file path has no valid file name")?
                .to_string();

            let embedder = create_embedder(&config.embedding)?;
            // Ingestion never talks to the chat backend but the assistant
            // is wired with one anyway so construction stays uniform.
            let assistant = build_assistant_for_ingest(config, embedder)?;

            assistant.save_document(&user, &source, &content)?;
            let chunks = assistant.ingest(&content, &source, &user).await?;
            println!("Ingested {} ({} chunks) for user '{}'.", source, chunks, user);
        }
        Commands::Ask { question, user } => {
            let assistant = build_assistant(config)?;
            let answer = assistant.answer(&user, &question).await?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!("\nSources: {}", answer.sources.join(", "));
            }
        }
        Commands::Remember { note, user } => {
            let embedder = create_embedder(&config.embedding)?;
            let assistant = build_assistant_for_ingest(config, embedder)?;
            assistant.append_knowledge(&user, &note)?;
            let chunks = assistant.reingest_all(&user).await?;
            println!("Noted. Knowledge base now holds {} chunks for user '{}'.", chunks, user);
        }
        Commands::Status { user } => {
            validate_user_id(&user)?;
            let dir = user_dir(&config.data.users_dir, &user)?;

            let store = VectorStore::open(&dir).await?;
            let records = store.count().await?;
            store.close().await;

            let log = ConversationLog::open(&dir).await?;
            let messages = log.count().await?;
            log.close().await;

            println!("User:     {}", user);
            println!("Records:  {}", records);
            println!("Messages: {}", messages);
        }
    }

    Ok(())
}

/// Like [`build_assistant`] but without a live chat backend, for commands
/// that only ingest. Uses a stub that fails if ever called.
fn build_assistant_for_ingest(
    config: Config,
    embedder: Arc<dyn knowledge_brain::embedding::Embedder>,
) -> anyhow::Result<Arc<Assistant>> {
    struct NoChat;

    #[async_trait::async_trait]
    impl knowledge_brain::llm::ChatModel for NoChat {
        async fn complete(
            &self,
            _messages: &[knowledge_brain::llm::ChatMessage],
        ) -> knowledge_brain::Result<String> {
            Err(knowledge_brain::Error::Config(
                "no chat backend configured for this command".to_string(),
            ))
        }
    }

    Ok(Arc::new(Assistant::new(config, embedder, Arc::new(NoChat))))
}
