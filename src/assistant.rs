//! Conversational RAG orchestration.
//!
//! [`Assistant`] ties the pipeline together. Ingestion: raw text →
//! chunker → embedder → vector store. Answering: recent history +
//! retrieved chunks → assembled prompt → chat model → memory append.
//!
//! The `/add` command is handled here as well: the remainder of the
//! question is appended to the user's notes file, the whole corpus is
//! re-ingested (idempotent per record id), and a fixed acknowledgment is
//! returned without touching the LLM.
//!
//! The embedder and chat model are injected at construction, so the
//! pipeline carries no hidden process-wide state and tests can substitute
//! deterministic backends.

use std::path::PathBuf;
use std::sync::Arc;

use crate::chunk::chunk_documents;
use crate::config::Config;
use crate::context::{build_context, format_history};
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::memory::ConversationLog;
use crate::models::{Answer, Document, Role};
use crate::store::VectorStore;
use crate::users;

/// System instruction constraining answers to the supplied context.
pub const SYSTEM_PROMPT: &str = "You are a personal knowledge assistant.\n\
You must answer ONLY using the provided context.\n\
If the answer is not contained in the context, say:\n\
\"I don't have enough information to answer that.\"\n\n\
Do not use outside knowledge.\n\
Be concise and factual.";

/// Fixed reply for the `/add` command; never LLM-generated.
pub const ADD_ACKNOWLEDGMENT: &str = "I've added this to your knowledge base.";

/// File that accumulates `/add` notes inside the user's documents dir.
pub const NOTES_SOURCE: &str = "user_notes.txt";

const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Whether a filename carries one of the plain-text extensions the
/// ingestion path accepts.
pub fn is_supported_source(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub struct Assistant {
    config: Config,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
}

impl Assistant {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            config,
            embedder,
            chat,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load every supported document from the user's `documents/` dir.
    /// A missing directory yields an empty list.
    pub fn load_user_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        users::validate_user_id(user_id)?;
        let docs_dir = self
            .config
            .data
            .users_dir
            .join(user_id)
            .join(users::DOCUMENTS_DIR);

        if !docs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(&docs_dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|e| e.path().is_file())
            .collect();
        // Deterministic ingestion order.
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_supported_source(&name) {
                continue;
            }
            let content = std::fs::read_to_string(entry.path())?;
            documents.push(Document {
                content,
                source: name,
            });
        }

        Ok(documents)
    }

    /// Write (or overwrite) a document into the user's `documents/` dir so
    /// later whole-corpus re-ingestion picks it up.
    pub fn save_document(&self, user_id: &str, source: &str, content: &str) -> Result<PathBuf> {
        if !is_supported_source(source) {
            return Err(Error::Validation(format!(
                "unsupported file type: '{}' (only .txt and .md are accepted)",
                source
            )));
        }
        // Reject anything that would escape the documents directory.
        if source.contains('/') || source.contains('\\') || source.starts_with('.') {
            return Err(Error::Validation(format!("invalid source name: '{}'", source)));
        }

        let docs_dir = users::documents_dir(&self.config.data.users_dir, user_id)?;
        let path = docs_dir.join(source);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Chunk, embed, and store one document for the user. Returns the
    /// number of chunks written. Synchronous from the caller's view; the
    /// boundary decides whether to await it or dispatch it detached.
    pub async fn ingest(&self, content: &str, source: &str, user_id: &str) -> Result<usize> {
        let documents = vec![Document {
            content: content.to_string(),
            source: source.to_string(),
        }];
        self.ingest_documents(&documents, user_id).await
    }

    /// Re-chunk, re-embed, and upsert the user's entire document set.
    /// Idempotent: record ids are derived from (source, chunk_id).
    pub async fn reingest_all(&self, user_id: &str) -> Result<usize> {
        let documents = self.load_user_documents(user_id)?;
        self.ingest_documents(&documents, user_id).await
    }

    async fn ingest_documents(&self, documents: &[Document], user_id: &str) -> Result<usize> {
        let chunks = chunk_documents(
            documents,
            self.config.chunking.chunk_size,
            self.config.chunking.overlap,
        )?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let user_dir = users::user_dir(&self.config.data.users_dir, user_id)?;
        let store = VectorStore::open(&user_dir).await?;
        store.add(&chunks, &embeddings).await?;
        store.close().await;

        Ok(chunks.len())
    }

    /// Append a note to the user's notes source and return where it was
    /// persisted.
    pub fn append_knowledge(&self, user_id: &str, text: &str) -> Result<PathBuf> {
        use std::io::Write;

        let docs_dir = users::documents_dir(&self.config.data.users_dir, user_id)?;
        let path = docs_dir.join(NOTES_SOURCE);

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "\n{}", text.trim())?;

        Ok(path)
    }

    /// Answer a question for a user, maintaining conversation memory.
    ///
    /// `/add <note>` (case-insensitive prefix) stores a knowledge note and
    /// returns a fixed acknowledgment; anything else runs retrieval and
    /// generation.
    pub async fn answer(&self, user_id: &str, question: &str) -> Result<Answer> {
        users::validate_user_id(user_id)?;

        let user_dir = users::user_dir(&self.config.data.users_dir, user_id)?;
        let log = ConversationLog::open(&user_dir).await?;
        let history = log.recent(self.config.retrieval.history_limit).await?;

        if question.to_lowercase().starts_with("/add") {
            let note = question[4..].trim();
            self.append_knowledge(user_id, note)?;
            self.reingest_all(user_id).await?;
            log.append(Role::Assistant, ADD_ACKNOWLEDGMENT).await?;
            log.close().await;
            return Ok(Answer {
                text: ADD_ACKNOWLEDGMENT.to_string(),
                sources: Vec::new(),
            });
        }

        // Retrieve grounding chunks for the question.
        let query_vec = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal(anyhow::anyhow!("empty embedding response")))?;

        let store = VectorStore::open(&user_dir).await?;
        let chunks = store.query(&query_vec, self.config.retrieval.top_k).await?;
        store.close().await;

        let context = build_context(&chunks);
        let history_text = format_history(&history);

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Conversation so far:\n{}\n\nKnowledge context:\n{}\n\nUser question:\n{}",
                history_text, context, question
            )),
        ];

        let text = self.chat.complete(&messages).await?;

        log.append(Role::User, question).await?;
        log.append(Role::Assistant, &text).await?;
        log.close().await;

        // Unique sources, best-ranked first.
        let mut sources: Vec<String> = Vec::new();
        for chunk in &chunks {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }

        Ok(Answer { text, sources })
    }
}
