//! Error taxonomy for the assistant core.
//!
//! Failures fall into four caller-visible buckets plus a catch-all:
//!
//! | Variant | Meaning | HTTP mapping |
//! |---------|---------|--------------|
//! | [`Error::Config`] | Missing credentials or invalid parameters | fatal at startup |
//! | [`Error::Validation`] | Bad user id, unsupported file type | 400 |
//! | [`Error::ServiceUnavailable`] | Embedding/LLM backend unreachable | 503 |
//! | [`Error::Storage`] | Filesystem or sqlite failure | 500 |
//! | [`Error::Internal`] | Anything else | 500 |
//!
//! `ServiceUnavailable` is never retried by the core — it is surfaced so
//! the boundary can tell the user the backend is down rather than that
//! the request was malformed.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Classify a reqwest failure: connection and timeout problems mean the
/// backend is unreachable; everything else is an internal error.
pub fn from_reqwest(context: &str, e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        Error::ServiceUnavailable(format!("{}: {}", context, e))
    } else {
        Error::Internal(anyhow::anyhow!("{}: {}", context, e))
    }
}
