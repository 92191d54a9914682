use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use sandbox_orchestrator::OrchestratorError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("please solve the challenge first")]
    MissingTicket,

    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("invalid instance id: {0}")]
    InvalidUuid(String),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("are you sure you solved it?")]
    NotSolved,

    #[error("node unreachable: {0}")]
    Upstream(String),

    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("rate limited")]
    RateLimited,
}

impl RpcError {
    /// Stable machine-readable code rendered next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingTicket => "missing_ticket",
            Self::InvalidTicket(_) => "invalid_ticket",
            Self::InvalidUuid(_) => "invalid_uuid",
            Self::MalformedBody(_) => "malformed_body",
            Self::NotSolved => "not_solved",
            Self::Upstream(_) => "upstream",
            Self::Orchestrator(e) => e.code(),
            Self::Internal(_) => "internal",
            Self::RateLimited => "rate_limited",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status(), Json(body)).into_response()
    }
}
