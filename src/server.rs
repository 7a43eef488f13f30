//! JSON HTTP API over [`KnowledgeService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/kbs` | Create a knowledge base `{name}` |
//! | `GET`  | `/api/kbs` | List the caller's knowledge bases |
//! | `GET`  | `/api/kbs/{kb_id}/files` | List files `[{name, slug}]` |
//! | `POST` | `/api/kbs/{kb_id}/files` | Multipart upload (field `file`) → `{slug, chunks}` |
//! | `GET`  | `/api/kbs/{kb_id}/files/{slug}` | Download the raw bytes |
//! | `POST` | `/api/kbs/{kb_id}/ask` | `{question, history}` → `{answer, chunks}` |
//!
//! Callers authenticate with `Authorization: Bearer <token>`; see [`crate::auth`].
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "forbidden", "message": "forbidden" } }
//! ```
//!
//! `bad_request` and `document_format` (400), `unauthenticated` (401),
//! `forbidden` (403), `not_found` (404), everything else (500).
//!
//! A client disconnect drops the handler future, which cancels in-flight
//! provider calls and rolls back any open transaction.

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path,
        State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use kb_harness_core::chat::ChatMessage;
use kb_harness_core::models::{Answer, FileSummary, KbId, KnowledgeBase, UserId};
use kb_harness_core::KbError;

use crate::auth::{Authenticator, HmacTokenAuthenticator};
use crate::config::Config;
use crate::ingest::IngestReport;
use crate::service::KnowledgeService;

/// Extra room for multipart framing on top of the configured file limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: KnowledgeService,
    auth: Arc<dyn Authenticator>,
}

impl AppState {
    fn caller(&self, headers: &HeaderMap) -> Option<UserId> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        self.auth.authenticate(authorization)
    }
}

/// Build the application router.
pub fn router(service: KnowledgeService, auth: Arc<dyn Authenticator>) -> Router {
    let body_limit = service.settings().max_upload_bytes + MULTIPART_OVERHEAD;
    let state = AppState { service, auth };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/kbs", get(handle_list_kbs).post(handle_create_kb))
        .route(
            "/api/kbs/{kb_id}/files",
            get(handle_list_files).post(handle_upload),
        )
        .route("/api/kbs/{kb_id}/files/{slug}", get(handle_download))
        .route("/api/kbs/{kb_id}/ask", axum::routing::post(handle_ask))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = KnowledgeService::from_config(config).await?;
    let auth = HmacTokenAuthenticator::new(config.auth.resolve_secret()?)?;
    let app = router(service, Arc::new(auth));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "kbh server listening");
    println!("kbh server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        let status = match &err {
            KbError::Validation(_) | KbError::DocumentFormat(_) => StatusCode::BAD_REQUEST,
            KbError::Unauthenticated => StatusCode::UNAUTHORIZED,
            KbError::Forbidden => StatusCode::FORBIDDEN,
            KbError::NotFound(_) => StatusCode::NOT_FOUND,
            KbError::EmbeddingProvider(_)
            | KbError::Rewrite(_)
            | KbError::Synthesis(_)
            | KbError::Store(_)
            | KbError::DimensionMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError {
        status: err.status(),
        code: "bad_request".to_string(),
        message: err.body_text(),
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

// ============ /api/kbs ============

#[derive(Deserialize)]
struct CreateKbRequest {
    name: String,
}

async fn handle_create_kb(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateKbRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<KnowledgeBase>), AppError> {
    let caller = state.caller(&headers);
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let kb = state.service.create_kb(caller, &req.name).await?;
    Ok((StatusCode::CREATED, Json(kb)))
}

async fn handle_list_kbs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<KnowledgeBase>>, AppError> {
    let kbs = state.service.list_kbs(state.caller(&headers)).await?;
    Ok(Json(kbs))
}

// ============ /api/kbs/{kb_id}/files ============

async fn handle_list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(kb_id): Path<KbId>,
) -> Result<Json<Vec<FileSummary>>, AppError> {
    let files = state
        .service
        .list_files(state.caller(&headers), kb_id)
        .await?;
    Ok(Json(files))
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(kb_id): Path<KbId>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, AppError> {
    let caller = state.caller(&headers);
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let report = state
            .service
            .upload_file(caller, kb_id, &file_name, mime_type, bytes.to_vec())
            .await?;
        return Ok(Json(report));
    }
    Err(bad_request("multipart field 'file' is required"))
}

async fn handle_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((kb_id, slug)): Path<(KbId, String)>,
) -> Result<Response, AppError> {
    let file = state
        .service
        .download_file(state.caller(&headers), kb_id, &slug)
        .await?;

    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file.file_name.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    )
        .into_response())
}

// ============ POST /api/kbs/{kb_id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(kb_id): Path<KbId>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let caller = state.caller(&headers);
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let answer = state
        .service
        .ask(caller, kb_id, &req.question, &req.history)
        .await?;
    Ok(Json(answer))
}
