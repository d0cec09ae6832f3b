//! Service error taxonomy shared by the store and the REST surface.
//!
//! Every error knows its HTTP status, so handlers can return
//! `Result<Json<T>, Error>` and let the conversion produce the
//! `{"error": ...}` body the client expects.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request field failed validation. The response names the field so
    /// the client can attach the message to the right input.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("task not found: {0}")]
    NotFound(Uuid),

    /// A stored row could not be decoded back into a task.
    #[error("corrupt task record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Corrupt { .. } | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(err = %self, "request failed");
        }
        let body = match &self {
            Error::Validation { field, .. } => {
                json!({ "error": self.to_string(), "field": field })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::validation("title", "title must not be empty").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NotFound(Uuid::new_v4()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Corrupt {
                id: "x".to_string(),
                reason: "bad id".to_string()
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_display_names_the_field() {
        let err = Error::validation("filter", "unknown filter selector: someday");
        assert!(err.to_string().starts_with("filter:"), "got: {err}");
    }
}
