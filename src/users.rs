//! Per-user directory layout.
//!
//! Every user owns one directory under the configured base:
//!
//! ```text
//! <users_dir>/<user_id>/
//!   documents/        plain-text knowledge sources
//!   vectors.sqlite    embedded chunk store
//!   chat.sqlite       conversation log
//! ```
//!
//! Directories are created lazily on first access and never destroyed by
//! the core. User ids end up in filesystem paths, so they are validated
//! before any path is built.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DOCUMENTS_DIR: &str = "documents";

/// Accept only ids that are safe to embed in a path: non-empty,
/// alphanumeric plus `-` and `_`.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(Error::Validation("user_id must not be empty".to_string()));
    }
    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Validation(format!(
            "invalid user_id '{}': only alphanumeric characters, '-' and '_' are allowed",
            user_id
        )));
    }
    Ok(())
}

/// Resolve (and lazily create) the user's base directory.
pub fn user_dir(users_dir: &Path, user_id: &str) -> Result<PathBuf> {
    validate_user_id(user_id)?;
    let dir = users_dir.join(user_id);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Resolve (and lazily create) the user's `documents/` directory.
pub fn documents_dir(users_dir: &Path, user_id: &str) -> Result<PathBuf> {
    let dir = user_dir(users_dir, user_id)?.join(DOCUMENTS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
