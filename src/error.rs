//! Error types for the htmlpdf-service library.
//!
//! A single enum, [`ServiceError`], covers every way a conversion request can
//! fail. Variants carry structured fields so the server log gets the full
//! picture (program path, stderr excerpt, I/O source), while the HTTP layer
//! maps each variant to a status code and a generic client message.
//!
//! Startup-only variants ([`ServiceError::RendererMissing`],
//! [`ServiceError::InvalidConfig`]) share the enum so the binary can report
//! them through the same `Display` impl.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors returned by the htmlpdf-service library.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Request body reached the configured cap.
    #[error("Request body is too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    /// Body could not be interpreted for the requested route.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Staging errors ────────────────────────────────────────────────────
    /// A staged artifact could not be created, written or removed.
    #[error("Staging failed while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Renderer errors ───────────────────────────────────────────────────
    /// The renderer executable could not be started.
    #[error("Failed to start renderer '{}': {source}", program.display())]
    ProcessSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The renderer did not finish within the configured timeout.
    #[error("Renderer '{}' timed out after {timeout:?}", program.display())]
    ProcessTimeout { program: PathBuf, timeout: Duration },

    /// The renderer ran but produced no usable output.
    #[error("Renderer '{}' failed: {detail}", program.display())]
    RendererFailure { program: PathBuf, detail: String },

    // ── Startup errors ────────────────────────────────────────────────────
    /// The configured HTML renderer does not exist.
    #[error("{} does not exist. Have you built it?", path.display())]
    RendererMissing { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Wrap an I/O error raised while staging or releasing an artifact.
    pub fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        ServiceError::Storage {
            context: context.into(),
            source,
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::ProcessTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::RendererFailure { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::Storage { .. }
            | ServiceError::ProcessSpawn { .. }
            | ServiceError::RendererMissing { .. }
            | ServiceError::InvalidConfig(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::PayloadTooLarge { .. } => "PayloadTooLarge",
            ServiceError::InvalidRequest(_) => "InvalidRequest",
            ServiceError::Storage { .. } => "StorageError",
            ServiceError::ProcessSpawn { .. } => "ProcessSpawnError",
            ServiceError::ProcessTimeout { .. } => "ProcessTimeoutError",
            ServiceError::RendererFailure { .. } => "RendererFailure",
            ServiceError::RendererMissing { .. }
            | ServiceError::InvalidConfig(_)
            | ServiceError::Internal(_) => "InternalError",
        }
    }

    /// Message safe to show a client. Server-side detail stays in the log.
    fn public_message(&self) -> String {
        match self {
            ServiceError::PayloadTooLarge { .. } | ServiceError::InvalidRequest(_) => {
                self.to_string()
            }
            ServiceError::ProcessTimeout { .. } => "Conversion timed out".to_string(),
            _ => "Conversion failed".to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Conversion error: {}", self);
        } else {
            tracing::warn!(code = self.code(), "Rejected request: {}", self);
        }

        let body = Json(json!({
            "error": self.code(),
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}
