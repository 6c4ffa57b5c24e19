//! ==============================================================================
//! error.rs - typed failures for acquisition and ingestion
//! ==============================================================================
//!
//! relationships:
//!     - FetchError: produced by acquire.rs, never escapes acquire()
//!     - IngestError: produced by domain.rs coercion, rendered by server.rs
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// why a single fetch attempt against one endpoint failed
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("timed out after {0} ms")]
    Timeout(u128),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// why an ingestion payload was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not numeric")]
    NotNumeric(&'static str),
    #[error("field `{0}` is not a finite number")]
    NotFinite(&'static str),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
