//! Per-user persistent vector store.
//!
//! Each user owns one sqlite database (`vectors.sqlite` inside the user
//! directory) holding a single logical collection of embedded chunks.
//! Records are keyed by `"{source}_{chunk_id}"`, so re-ingesting a source
//! overwrites its prior records instead of duplicating them.
//!
//! Similarity queries load every stored vector and rank by cosine
//! similarity in Rust; collections here are personal document sets, small
//! enough that a linear scan beats maintaining an index.

use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievedChunk};

const DB_FILE: &str = "vectors.sqlite";

pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    /// Open (creating if absent) the vector store inside `user_dir`.
    pub async fn open(user_dir: &Path) -> Result<Self> {
        let pool = db::connect(&user_dir.join(DB_FILE)).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                chunk_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_source ON records(source)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Upsert one record per chunk. No-op when `chunks` is empty.
    pub async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        if chunks.len() != embeddings.len() {
            return Err(Error::Internal(anyhow::anyhow!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut tx = self.pool.begin().await?;

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            sqlx::query(
                r#"
                INSERT INTO records (id, source, chunk_id, content, embedding)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    chunk_id = excluded.chunk_id,
                    content = excluded.content,
                    embedding = excluded.embedding
                "#,
            )
            .bind(chunk.record_id())
            .bind(&chunk.source)
            .bind(chunk.chunk_id)
            .bind(&chunk.content)
            .bind(vec_to_blob(embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Return up to `min(top_k, count)` records nearest to `query_vec`,
    /// most similar first. An empty collection short-circuits to an empty
    /// list without touching the similarity path.
    pub async fn query(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT source, chunk_id, content, embedding FROM records")
            .fetch_all(&self.pool)
            .await?;

        let mut results: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                RetrievedChunk {
                    content: row.get("content"),
                    source: row.get("source"),
                    chunk_id: row.get("chunk_id"),
                    score: cosine_similarity(query_vec, &vec),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(results)
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(source: &str, chunk_id: i64, content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            source: source.to_string(),
            chunk_id,
        }
    }

    async fn open_store(tmp: &TempDir) -> VectorStore {
        VectorStore::open(tmp.path()).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_query_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let results = store.query(&[1.0, 0.0], 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_add_empty_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.add(&[], &[]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let chunks = vec![
            chunk("a.txt", 0, "east"),
            chunk("a.txt", 1, "north"),
            chunk("a.txt", 2, "diagonal"),
        ];
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.7, 0.7],
        ];
        store.add(&chunks, &embeddings).await.unwrap();

        let results = store.query(&[1.0, 0.1], 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].content, "east");
        assert_eq!(results[1].content, "diagonal");
        assert_eq!(results[2].content, "north");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_top_k_capped_at_store_size() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store
            .add(&[chunk("a.txt", 0, "only")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_reingestion_overwrites_by_id() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let chunks = vec![chunk("a.txt", 0, "old"), chunk("a.txt", 1, "tail")];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        store.add(&chunks, &embeddings).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        // Same ids, new content: count stays, content is replaced.
        let updated = vec![chunk("a.txt", 0, "new"), chunk("a.txt", 1, "tail")];
        store.add(&updated, &embeddings).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let results = store.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].content, "new");
    }

    #[tokio::test]
    async fn test_mismatched_lengths_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let err = store
            .add(&[chunk("a.txt", 0, "x")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = open_store(&tmp).await;
            store
                .add(&[chunk("a.txt", 0, "persisted")], &[vec![0.5, 0.5]])
                .await
                .unwrap();
            store.close().await;
        }
        let store = open_store(&tmp).await;
        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.query(&[0.5, 0.5], 1).await.unwrap();
        assert_eq!(results[0].source, "a.txt");
        assert_eq!(results[0].chunk_id, 0);
    }
}
