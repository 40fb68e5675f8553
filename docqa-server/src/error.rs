//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docqa_rag::{ErrorKind, RagError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Rag(e) => match e.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Ingestion => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::NotReady => StatusCode::CONFLICT,
                ErrorKind::Embedding | ErrorKind::Generation => StatusCode::BAD_GATEWAY,
                ErrorKind::Index | ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::Rag(e) => e.kind().as_str(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { kind: self.kind().to_string(), message: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}
