use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use docqa_rag::{
    ConversationTurn, Document, Orchestrator, Page, SessionStatus, SourceMetadata,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Level, debug, info};

use crate::{config::ServerConfig, error::ApiError, session::SessionRegistry};

/// Upper bound on an uploaded document body.
const MAX_DOCUMENT_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { sessions: SessionRegistry::default(), orchestrator: Arc::new(orchestrator) }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreateResponse {
    pub session_id: String,
}

/// A document whose pages have already been extracted to text.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub document_id: String,
    pub pages: Vec<Page>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub source_uri: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub session_id: String,
    pub document_id: String,
    pub pages: usize,
    pub chunks: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Accepted for client compatibility; the server-held history is authoritative.
    #[serde(default)]
    pub chat_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub standalone_question: String,
    pub source_documents: Vec<SourceMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub status: SessionStatus,
    pub history: Vec<ConversationTurn>,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session_id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{session_id}/documents", post(upload_document))
        .route("/api/sessions/{session_id}/ask", post(ask))
        .route("/api/sessions/{session_id}/reset", post(reset_session))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let orchestrator =
        config.build_orchestrator().context("failed to configure the question-answering pipeline")?;
    let app = app_router(AppState::new(orchestrator));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa-server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docqa-server"}))
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.create().await;
    (StatusCode::CREATED, Json(SessionCreateResponse { session_id: session.id().to_string() }))
}

async fn get_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session =
        state.sessions.get(&session_id).await.ok_or(ApiError::SessionNotFound(session_id))?;
    Ok(Json(SessionResponse {
        session_id: session.id().to_string(),
        status: session.status().await,
        history: session.history().await,
    }))
}

async fn delete_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(&session_id).await.ok_or(ApiError::SessionNotFound(session_id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_document(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let session = state.sessions.get_or_create(&session_id).await;
    let document = Document {
        id: request.document_id,
        pages: request.pages,
        metadata: request.metadata,
        source_uri: request.source_uri,
    };

    let report = state.orchestrator.ingest(&session, &document).await?;
    Ok(Json(IngestResponse {
        session_id,
        document_id: report.document_id,
        pages: report.pages,
        chunks: report.chunks,
    }))
}

async fn ask(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let session =
        state.sessions.get(&session_id).await.ok_or(ApiError::SessionNotFound(session_id))?;

    if !request.chat_history.is_empty() && tracing::enabled!(Level::DEBUG) {
        let server_turns = session.status().await.turns;
        if request.chat_history.len() != server_turns {
            debug!(
                session.id = %session.id(),
                client_turns = request.chat_history.len(),
                server_turns,
                "client chat_history differs from server history; using server history"
            );
        }
    }

    let answer = state.orchestrator.ask(&session, &request.question).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        standalone_question: answer.standalone_question,
        source_documents: answer.sources,
    }))
}

async fn reset_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionStatus>, ApiError> {
    let session =
        state.sessions.get(&session_id).await.ok_or(ApiError::SessionNotFound(session_id))?;
    state.orchestrator.reset(&session).await;
    Ok(Json(session.status().await))
}
