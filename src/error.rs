use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::api::response;
use crate::llm::LlmError;
use crate::scraper::ExtractError;

pub const MSG_INTERNAL: &str = "Σφάλμα κατά την ανάλυση. Παρακαλώ δοκιμάστε ξανά αργότερα.";
pub const MSG_RATE_LIMITED: &str =
    "Έχετε υπερβεί το όριο αιτημάτων. Παρακαλώ περιμένετε πριν κάνετε νέα ανάλυση.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Rate limit exceeded ({limit}), retry after {retry_after}s")]
    RateLimited { retry_after: u64, limit: String },

    #[error("Generation service error: {0}")]
    Service(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Service(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            AppError::BadRequest(msg) => response::error(status, msg).into_response(),
            AppError::RateLimited { retry_after, limit } => {
                response::rate_limited(MSG_RATE_LIMITED.to_string(), retry_after, limit)
            }
            // Raw causes stay in the log; clients get a stable message.
            other => {
                error!("{}", other);
                response::error(status, MSG_INTERNAL.to_string()).into_response()
            }
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Service(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::RateLimited { retry_after: 3, limit: "10/minute".into() }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AppError::Service("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rate_limited_response_carries_retry_after_header() {
        let response = AppError::RateLimited { retry_after: 42, limit: "10/minute".into() }
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn extraction_failures_become_bad_requests() {
        let err: AppError = ExtractError::InsufficientContent(12).into();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("12")));
    }
}
