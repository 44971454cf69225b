//! Prompt context assembly.
//!
//! Pure string formatting: retrieved chunks and recent history become the
//! text blocks the answer generator hands to the LLM. Chunk order is
//! whatever the store returned (similarity-ranked); nothing is re-sorted
//! here.

use crate::models::{Message, RetrievedChunk};

/// Render retrieved chunks as `source:<source>` headers followed by the
/// chunk text, separated by blank lines.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("source:{}\n{}", c.source, c.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render history as `ROLE: content` lines in chronological order.
pub fn format_history(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&message.role.as_str().to_uppercase());
        out.push_str(": ");
        out.push_str(&message.content);
        out.push('\n');
    }
    out
}
