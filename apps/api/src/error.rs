//! Error types for the REST API.
//!
//! ## Wire Format
//! ```text
//! HTTP 409
//! { "error": "conflict", "message": "Order 41 is closed and can no longer be changed" }
//! ```
//!
//! | `error`               | Status | Source                                   |
//! |-----------------------|--------|------------------------------------------|
//! | `db_not_configured`   | 503    | no `DATABASE_URL`                        |
//! | `not_found`           | 404    | `DbError::NotFound`, unknown login email |
//! | `invalid_credentials` | 401    | wrong password, inactive user            |
//! | `unauthorized`        | 401    | missing / invalid bearer token           |
//! | `forbidden`           | 403    | permission check failed                  |
//! | `rate_limit_exceeded` | 429    | rate limiter                             |
//! | `validation_error`    | 400    | bad input, ledger rule violation         |
//! | `conflict`            | 409    | duplicate, invalid state transition      |
//! | `database_error`      | 500    | connection / query failure               |
//! | `internal_error`      | 500    | anything else                            |

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use bistro_core::CoreError;
use bistro_db::DbError;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database is not configured")]
    DbNotConfigured,

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Details are logged, the client only sees a generic message.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::DbNotConfigured => "db_not_configured",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::RateLimited { .. } => "rate_limit_exceeded",
            ApiError::Validation(_) => "validation_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::Database(_) => "database_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DbNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidCredentials | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) => "A database error occurred".to_string(),
            ApiError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Database(detail) => error!(detail = %detail, "Database error"),
            ApiError::Internal(detail) => error!(detail = %detail, "Internal error"),
            ApiError::Unauthorized(reason) => warn!(reason = %reason, "Rejected request"),
            _ => {}
        }

        let status = self.status();
        let mut response = (
            status,
            Json(ErrorBody {
                error: self.code(),
                message: self.public_message(),
            }),
        )
            .into_response();

        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EntryImmutable { .. }
            | CoreError::InvalidOrderTransition { .. }
            | CoreError::OrderFinished { .. }
            | CoreError::InvalidState { .. } => ApiError::Conflict(err.to_string()),

            CoreError::UnbalancedEntry { .. }
            | CoreError::TooFewPostings { .. }
            | CoreError::ZeroEntry
            | CoreError::InvalidPosting { .. }
            | CoreError::AccountCycle { .. }
            | CoreError::EmptyOrder
            | CoreError::OrderTooLarge { .. } => ApiError::Validation(err.to_string()),

            CoreError::Validation(inner) => ApiError::Validation(inner.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ApiError::Conflict(err.to_string())
            }
            DbError::ConstraintViolation(_) => ApiError::Validation(err.to_string()),
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ApiError::Database(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::NotFound("Order not found: 9".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Order not found: 9");
    }

    #[tokio::test]
    async fn test_database_details_are_not_returned() {
        let response =
            ApiError::Database("relation \"orders\" does not exist".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "database_error");
        assert!(!body["message"].as_str().unwrap().contains("orders"));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "42");
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: ApiError = DbError::Domain(CoreError::OrderFinished {
            order_id: 3,
            status: "closed".to_string(),
        })
        .into();
        assert_eq!(err.code(), "conflict");

        let err: ApiError = CoreError::EmptyOrder.into();
        assert_eq!(err.code(), "validation_error");

        let err: ApiError = DbError::duplicate("email", "a@b.c").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = DbError::PoolExhausted.into();
        assert_eq!(err.code(), "database_error");
    }
}
