use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::auth::validation::FieldViolation;

/// Classification of an `AppError`, independent of its operation and cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    Unauthorized,
    NotFound,
    Canceled,
    Internal,
}

/// Error crossing the service boundary. `op` names the originating operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{op}: invalid input")]
    Validation {
        op: &'static str,
        violations: Vec<FieldViolation>,
    },

    #[error("{op}: email already exists")]
    Conflict { op: &'static str },

    #[error("{op}: unauthorized")]
    Unauthorized { op: &'static str },

    #[error("{op}: not found")]
    NotFound { op: &'static str },

    #[error("{op}: canceled")]
    Canceled { op: &'static str },

    #[error("{op}: internal error: {source}")]
    Internal {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn internal(op: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            op,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Canceled { .. } => ErrorKind::Canceled,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Self::Validation { op, .. }
            | Self::Conflict { op }
            | Self::Unauthorized { op }
            | Self::NotFound { op }
            | Self::Canceled { op }
            | Self::Internal { op, .. } => op,
        }
    }

    /// Status table for the HTTP boundary. Conflict stays 400 so the status
    /// alone does not confirm that an email is registered.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Canceled => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::Conflict => "User with given email already exists",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NotFound => "Not found",
            ErrorKind::Canceled => "Request timed out",
            ErrorKind::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, op = self.op(), "request failed");
        } else {
            tracing::warn!(error = %self, op = self.op(), "request rejected");
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.public_message(),
        });
        if let Self::Validation { violations, .. } = &self {
            body["violations"] = json!(violations);
        }

        (status, Json(body)).into_response()
    }
}
