//! HTTP boundary layer.
//!
//! Thin JSON API over the assistant core:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload` | Multipart file upload; ingestion runs in the background |
//! | `POST` | `/ask` | Ask a question (rate limited per user) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Error responses carry a machine-readable code:
//!
//! ```json
//! { "error": { "code": "service_unavailable", "message": "..." } }
//! ```
//!
//! Codes: `bad_request` (400), `rate_limited` (429),
//! `service_unavailable` (503), `internal` (500). Connectivity failures
//! against the embedding or LLM backend map to 503 so clients can retry
//! later; everything else unexpected is a 500.
//!
//! Upload ingestion is fire-and-forget: the file is persisted into the
//! user's `documents/` directory, the response returns immediately, and a
//! detached task chunks/embeds the content. Ingestion failures are logged
//! and never crash the dispatching layer.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::assistant::{is_supported_source, Assistant};
use crate::error::Error;
use crate::rate_limit::RateLimiter;

const DEFAULT_USER: &str = "default_user";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    limiter: Arc<RateLimiter>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(assistant: Arc<Assistant>) -> anyhow::Result<()> {
    let bind_addr = assistant.config().server.bind.clone();
    let limiter = Arc::new(RateLimiter::new(&assistant.config().rate_limit));

    let state = AppState { assistant, limiter };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    info!(addr = %bind_addr, "knowledge assistant listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn rate_limited() -> AppError {
    AppError {
        status: StatusCode::TOO_MANY_REQUESTS,
        code: "rate_limited",
        message: "Too many requests. Please wait a minute.".to_string(),
    }
}

/// Map core errors to user-facing statuses: unreachable backends are 503,
/// validation problems 400, everything else 500.
fn classify_error(err: Error) -> AppError {
    match err {
        Error::ServiceUnavailable(message) => AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "service_unavailable",
            message,
        },
        Error::Validation(message) => bad_request(message),
        Error::Config(message) => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message,
        },
        Error::Storage(message) => {
            error!(%message, "storage failure");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: "An internal error occurred while processing your request.".to_string(),
            }
        }
        Error::Internal(e) => {
            error!(error = %e, "internal failure");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: "An internal error occurred while processing your request.".to_string(),
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    status: String,
    message: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut user_id = DEFAULT_USER.to_string();
    let mut file: Option<(String, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("user_id") => {
                user_id = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid user_id field: {}", e)))?;
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| bad_request("file field is missing a filename"))?;
                let content = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("file must be valid UTF-8 text: {}", e)))?;
                file = Some((filename, content));
            }
            _ => {}
        }
    }

    let (filename, content) =
        file.ok_or_else(|| bad_request("multipart body must contain a 'file' field"))?;

    if !is_supported_source(&filename) {
        return Err(bad_request("Only .txt and .md are supported currently."));
    }

    state
        .assistant
        .save_document(&user_id, &filename, &content)
        .map_err(classify_error)?;

    // Fire-and-forget ingestion: the upload already succeeded, failures
    // here are logged, not surfaced.
    let assistant = Arc::clone(&state.assistant);
    let task_filename = filename.clone();
    tokio::spawn(async move {
        match assistant.ingest(&content, &task_filename, &user_id).await {
            Ok(chunks) => {
                info!(file = %task_filename, user = %user_id, chunks, "background ingestion complete")
            }
            Err(e) => {
                error!(file = %task_filename, user = %user_id, error = %e, "background ingestion failed")
            }
        }
    });

    Ok(Json(UploadResponse {
        filename,
        status: "processing".to_string(),
        message: "File uploaded. Processing in background...".to_string(),
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default = "default_user")]
    user_id: String,
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<String>,
    latency: f64,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    if !state.limiter.check(&request.user_id) {
        return Err(rate_limited());
    }

    let start = Instant::now();
    let answer = state
        .assistant
        .answer(&request.user_id, &request.question)
        .await
        .map_err(classify_error)?;

    Ok(Json(QueryResponse {
        answer: answer.text,
        sources: answer.sources,
        latency: (start.elapsed().as_secs_f64() * 10_000.0).round() / 10_000.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable_maps_to_503() {
        let err = classify_error(Error::ServiceUnavailable("backend down".to_string()));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "service_unavailable");
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err = classify_error(Error::Validation("bad user id".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
    }

    #[test]
    fn test_storage_and_internal_map_to_500() {
        let err = classify_error(Error::Storage("disk full".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let err = classify_error(Error::Internal(anyhow::anyhow!("boom")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal");
    }
}
