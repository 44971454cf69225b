//! End-to-end pipeline tests with deterministic fake backends.
//!
//! The embedder here maps text to a letter-frequency vector, so retrieval
//! ranking is fully reproducible without a model or network. The chat
//! backend records the prompts it receives and returns canned text.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use knowledge_brain::assistant::{Assistant, ADD_ACKNOWLEDGMENT, NOTES_SOURCE, SYSTEM_PROMPT};
use knowledge_brain::config::Config;
use knowledge_brain::embedding::Embedder;
use knowledge_brain::llm::{ChatMessage, ChatModel};
use knowledge_brain::memory::ConversationLog;
use knowledge_brain::models::Role;
use knowledge_brain::store::VectorStore;
use knowledge_brain::users::user_dir;
use knowledge_brain::{Error, Result};

/// Embeds text as normalized letter frequencies over a-z. Texts sharing
/// rare letters ("zebra" → z) score high cosine similarity with each
/// other and low with text that never uses them.
struct LetterFreqEmbedder;

#[async_trait]
impl Embedder for LetterFreqEmbedder {
    fn model_name(&self) -> &str {
        "letter-freq"
    }

    fn dims(&self) -> usize {
        26
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vec = vec![0.0f32; 26];
                for c in text.chars().flat_map(|c| c.to_lowercase()) {
                    if c.is_ascii_lowercase() {
                        vec[(c as usize) - ('a' as usize)] += 1.0;
                    }
                }
                let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for x in &mut vec {
                        *x /= norm;
                    }
                }
                vec
            })
            .collect())
    }
}

/// An embedder whose backend is unreachable.
struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn model_name(&self) -> &str {
        "down"
    }

    fn dims(&self) -> usize {
        26
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::ServiceUnavailable(
            "embedding backend unreachable".to_string(),
        ))
    }
}

/// Returns a canned answer and records every prompt it was asked.
struct CannedChat {
    reply: String,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl CannedChat {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_user_prompt(&self) -> String {
        let calls = self.calls.lock().unwrap();
        let messages = calls.last().expect("chat was never called");
        messages
            .iter()
            .find(|m| m.role == "user")
            .expect("no user message in prompt")
            .content
            .clone()
    }
}

#[async_trait]
impl ChatModel for CannedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

/// A chat backend whose service is unreachable.
struct DownChat;

#[async_trait]
impl ChatModel for DownChat {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(Error::ServiceUnavailable(
            "completion backend unreachable".to_string(),
        ))
    }
}

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.data.users_dir = root.join("users");
    config.chunking.chunk_size = 500;
    config.chunking.overlap = 100;
    config.retrieval.top_k = 3;
    config.retrieval.history_limit = 6;
    config
}

fn make_assistant(root: &Path, chat: Arc<dyn ChatModel>) -> Assistant {
    Assistant::new(test_config(root), Arc::new(LetterFreqEmbedder), chat)
}

async fn store_count(config: &Config, user: &str) -> i64 {
    let dir = user_dir(&config.data.users_dir, user).unwrap();
    let store = VectorStore::open(&dir).await.unwrap();
    let count = store.count().await.unwrap();
    store.close().await;
    count
}

#[tokio::test]
async fn test_ingest_chunk_counts_and_idempotence() {
    let tmp = TempDir::new().unwrap();
    let assistant = make_assistant(tmp.path(), CannedChat::new("ok"));

    // 1200 chars with size 500 / overlap 100 gives windows at 0, 400, 800.
    let content = "a".repeat(1200);
    let written = assistant.ingest(&content, "big.txt", "alice").await.unwrap();
    assert_eq!(written, 3);
    assert_eq!(store_count(assistant.config(), "alice").await, 3);

    // Records are keyed by (source, chunk_id), so re-ingesting the same
    // document overwrites rather than duplicates.
    assistant.ingest(&content, "big.txt", "alice").await.unwrap();
    assert_eq!(store_count(assistant.config(), "alice").await, 3);
}

#[tokio::test]
async fn test_answer_is_grounded_in_retrieved_chunks() {
    let tmp = TempDir::new().unwrap();
    let chat = CannedChat::new("Zebras sleep standing up.");
    let assistant = make_assistant(tmp.path(), chat.clone());

    assistant
        .ingest(
            "zebra zebra zebra zzz quiz fuzzy jazz buzz",
            "animals.txt",
            "alice",
        )
        .await
        .unwrap();
    assistant
        .ingest(
            "the moon orbits the earth in about one month",
            "space.txt",
            "alice",
        )
        .await
        .unwrap();

    let answer = assistant.answer("alice", "zzz zebra quiz").await.unwrap();

    assert_eq!(answer.text, "Zebras sleep standing up.");
    assert_eq!(answer.sources.first().map(String::as_str), Some("animals.txt"));

    // The prompt handed to the model carries the retrieved passage, the
    // question, and the source tag.
    let prompt = chat.last_user_prompt();
    assert!(prompt.contains("source:animals.txt"));
    assert!(prompt.contains("zebra zebra zebra"));
    assert!(prompt.contains("User question:\nzzz zebra quiz"));
}

#[tokio::test]
async fn test_system_prompt_constrains_to_context() {
    let tmp = TempDir::new().unwrap();
    let chat = CannedChat::new("ok");
    let assistant = make_assistant(tmp.path(), chat.clone());

    assistant.ingest("some text", "doc.txt", "bob").await.unwrap();
    assistant.answer("bob", "anything").await.unwrap();

    let calls = chat.calls.lock().unwrap();
    let first = &calls[0][0];
    assert_eq!(first.role, "system");
    assert_eq!(first.content, SYSTEM_PROMPT);
}

#[tokio::test]
async fn test_add_command_stores_note_without_calling_llm() {
    let tmp = TempDir::new().unwrap();
    let chat = CannedChat::new("should never appear");
    let assistant = make_assistant(tmp.path(), chat.clone());

    let answer = assistant
        .answer("alice", "/add The wifi password is hunter2")
        .await
        .unwrap();

    assert_eq!(answer.text, ADD_ACKNOWLEDGMENT);
    assert!(answer.sources.is_empty());
    assert_eq!(chat.call_count(), 0);

    // The note landed in the notes file and became retrievable.
    let notes_path = assistant
        .config()
        .data
        .users_dir
        .join("alice")
        .join("documents")
        .join(NOTES_SOURCE);
    let notes = std::fs::read_to_string(notes_path).unwrap();
    assert!(notes.contains("The wifi password is hunter2"));
    assert!(store_count(assistant.config(), "alice").await > 0);

    // Case-insensitive prefix.
    let answer = assistant.answer("alice", "/ADD another fact").await.unwrap();
    assert_eq!(answer.text, ADD_ACKNOWLEDGMENT);
    assert_eq!(chat.call_count(), 0);
}

#[tokio::test]
async fn test_conversation_memory_records_both_sides() {
    let tmp = TempDir::new().unwrap();
    let assistant = make_assistant(tmp.path(), CannedChat::new("answer one"));

    assistant.ingest("alpha beta gamma", "doc.txt", "carol").await.unwrap();
    assistant.answer("carol", "first question").await.unwrap();
    assistant.answer("carol", "second question").await.unwrap();

    let dir = user_dir(&assistant.config().data.users_dir, "carol").unwrap();
    let log = ConversationLog::open(&dir).await.unwrap();
    let messages = log.recent(10).await.unwrap();
    log.close().await;

    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "first question");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[2].content, "second question");
    assert_eq!(messages[3].role, Role::Assistant);
}

#[tokio::test]
async fn test_unreachable_chat_backend_is_service_unavailable() {
    let tmp = TempDir::new().unwrap();
    let assistant = make_assistant(tmp.path(), Arc::new(DownChat));

    assistant.ingest("some text", "doc.txt", "dave").await.unwrap();
    let err = assistant.answer("dave", "question").await.unwrap_err();
    assert!(matches!(err, Error::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_unreachable_embedding_backend_is_service_unavailable() {
    let tmp = TempDir::new().unwrap();
    let assistant = Assistant::new(
        test_config(tmp.path()),
        Arc::new(DownEmbedder),
        CannedChat::new("ok"),
    );

    let err = assistant.ingest("text", "doc.txt", "erin").await.unwrap_err();
    assert!(matches!(err, Error::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_invalid_user_id_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let assistant = make_assistant(tmp.path(), CannedChat::new("ok"));

    let err = assistant.answer("../escape", "question").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_save_document_rejects_unsupported_and_escaping_names() {
    let tmp = TempDir::new().unwrap();
    let assistant = make_assistant(tmp.path(), CannedChat::new("ok"));

    assert!(matches!(
        assistant.save_document("alice", "report.pdf", "x").unwrap_err(),
        Error::Validation(_)
    ));
    assert!(matches!(
        assistant.save_document("alice", "../sneaky.txt", "x").unwrap_err(),
        Error::Validation(_)
    ));

    let path = assistant.save_document("alice", "ok.txt", "hello").unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
}

#[tokio::test]
async fn test_reingest_all_covers_saved_documents() {
    let tmp = TempDir::new().unwrap();
    let assistant = make_assistant(tmp.path(), CannedChat::new("ok"));

    assistant.save_document("frank", "one.txt", "first document").unwrap();
    assistant.save_document("frank", "two.md", "second document").unwrap();

    let written = assistant.reingest_all("frank").await.unwrap();
    assert_eq!(written, 2);
    assert_eq!(store_count(assistant.config(), "frank").await, 2);
}
