//! Fixed-size overlapping text chunker.
//!
//! Splits document text into windows of `chunk_size` characters, each
//! window starting `chunk_size - overlap` characters after the previous
//! one. The final chunk may be shorter than `chunk_size`. Sizes are
//! measured in Unicode scalar values, not bytes, so multibyte text never
//! splits mid-character.
//!
//! Chunk ids form a dense 0-based sequence per document and reset for
//! each new document. Empty documents yield no chunks.
//!
//! # Example
//!
//! ```rust
//! use knowledge_brain::chunk::chunk_documents;
//! use knowledge_brain::models::Document;
//!
//! let docs = vec![Document {
//!     content: "a".repeat(1200),
//!     source: "notes.txt".to_string(),
//! }];
//! let chunks = chunk_documents(&docs, 500, 100).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].chunk_id, 2);
//! ```

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Chunk a batch of documents with a sliding character window.
///
/// `overlap >= chunk_size` would make the window stop advancing, so it is
/// rejected as a configuration error (the config loader enforces the same
/// bound up front).
pub fn chunk_documents(documents: &[Document], chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(Error::Config("chunk_size must be > 0".to_string()));
    }
    if overlap >= chunk_size {
        return Err(Error::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();

    for doc in documents {
        // Byte offset of every char boundary, so windows can be sliced
        // without scanning from the front each time.
        let boundaries: Vec<usize> = doc.content.char_indices().map(|(i, _)| i).collect();
        let char_len = boundaries.len();

        let mut start = 0usize;
        let mut chunk_id: i64 = 0;

        while start < char_len {
            let end = (start + chunk_size).min(char_len);
            let byte_start = boundaries[start];
            let byte_end = if end < char_len {
                boundaries[end]
            } else {
                doc.content.len()
            };

            chunks.push(Chunk {
                content: doc.content[byte_start..byte_end].to_string(),
                source: doc.source.clone(),
                chunk_id,
            });

            chunk_id += 1;
            if end == char_len {
                break;
            }
            start += step;
        }
    }

    Ok(chunks)
}
