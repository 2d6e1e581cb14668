use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::orders::OrderStatus;

#[derive(Error, Debug)]
pub enum CafeError {
    /// Malformed or empty input to a pure computation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator fetch/update failed or timed out.
    #[error("external call failed: {0}")]
    ExternalCall(String),

    #[error("invalid order transition {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CafeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn external(op: &str, err: impl std::fmt::Display) -> Self {
        Self::ExternalCall(format!("{op}: {err}"))
    }
}

impl IntoResponse for CafeError {
    fn into_response(self) -> Response {
        let status = match &self {
            CafeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CafeError::NotFound(_) => StatusCode::NOT_FOUND,
            CafeError::ExternalCall(_) => StatusCode::BAD_GATEWAY,
            CafeError::InvalidTransition { .. }
            | CafeError::Configuration(_)
            | CafeError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CafeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (CafeError::invalid_input("empty catalog"), StatusCode::BAD_REQUEST),
            (CafeError::NotFound("cafe x".into()), StatusCode::NOT_FOUND),
            (CafeError::external("update_cafe", "boom"), StatusCode::BAD_GATEWAY),
            (
                CafeError::InvalidTransition {
                    from: OrderStatus::Completed,
                    to: OrderStatus::Cancelled,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn external_error_keeps_operation_name() {
        let err = CafeError::external("update_menu_item", "status 503");
        assert_eq!(
            err.to_string(),
            "external call failed: update_menu_item: status 503"
        );
    }
}
