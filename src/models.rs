//! Core data models used throughout the assistant.
//!
//! These types represent the documents, chunks, and messages that flow
//! through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A raw text document, read once at ingestion time. Only its chunks are
/// persisted.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub source: String,
}

/// A bounded substring of a source document, the unit of embedding and
/// retrieval. Identity is `(source, chunk_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    /// Dense 0-based sequence number within the source.
    pub chunk_id: i64,
}

impl Chunk {
    /// Stable record id within a user's store. Re-ingesting the same
    /// source yields the same ids, so later adds overwrite earlier ones.
    pub fn record_id(&self) -> String {
        format!("{}_{}", self.source, self.chunk_id)
    }
}

/// A chunk returned from the vector store, ranked by similarity.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub chunk_id: i64,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(Error::Storage(format!("unknown message role: {}", other))),
        }
    }
}

/// One entry in a user's append-only conversation log.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Server-assigned, monotonically increasing.
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The result of answering a question: the generated (or fixed) text plus
/// the sources of the chunks that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}
