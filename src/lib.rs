//! Per-user knowledge assistant: ingest plain-text documents into a local
//! vector store, then answer questions grounded in the retrieved passages
//! via an OpenAI-compatible chat backend.
//!
//! # Architecture
//!
//! ```text
//! documents ──> chunk ──> embedding ──> store (sqlite, per user)
//!                                         │
//! question ──> embedding ──> query ───────┘
//!                              │
//!                              ▼
//!               context + conversation memory ──> llm ──> answer
//! ```
//!
//! # Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`assistant`] | Orchestration: ingestion, `/add` notes, answering |
//! | [`chunk`] | Fixed-window overlapping character chunking |
//! | [`config`] | TOML configuration with per-field defaults |
//! | [`context`] | Prompt assembly from retrieved chunks and history |
//! | [`db`] | SQLite pool setup (WAL, create-if-missing) |
//! | [`embedding`] | [`Embedder`](embedding::Embedder) trait and providers |
//! | [`error`] | Crate error taxonomy |
//! | [`llm`] | OpenAI-compatible chat completion client |
//! | [`memory`] | Per-user conversation log |
//! | [`models`] | Core data types |
//! | [`rate_limit`] | Per-user sliding-window rate limiter |
//! | [`server`] | Axum HTTP boundary |
//! | [`store`] | Per-user vector store with cosine ranking |
//! | [`users`] | User id validation and on-disk layout |

pub mod assistant;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod rate_limit;
pub mod server;
pub mod store;
pub mod users;

pub use config::{load_config, Config};
pub use error::{Error, Result};
