//! # Error Handling
//!
//! Unified error handling for the meter API. Every failure leaves the server
//! as a problem+json body carrying a stable error code and the request's
//! trace id.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            trace_id: Self::current_trace_id(),
        }
    }

    /// Trace id of the current request, or a short correlation id outside one
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]).into_boxed_str())
            })
    }
}

pub(crate) fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    if matches!(
        error.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    ) {
        return true;
    }

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code = code.as_ref();
        code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

/// Errors surfaced by the repository layer
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl RepositoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap a database error, turning unique violations into conflicts.
    pub fn database_error(error: sea_orm::DbErr, what: &str) -> Self {
        if is_unique_violation(&error) {
            Self::Conflict(what.to_string())
        } else {
            Self::Database(error)
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(db) => db.into(),
            RepositoryError::NotFound(what) => not_found(&what),
            RepositoryError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
            }
            RepositoryError::Conflict(what) => ApiError::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{what} already exists"),
            ),
            RepositoryError::PasswordHash(reason) => {
                tracing::error!(%reason, "Password hashing failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                )
            }
        }
    }
}

/// Create a not found error (404)
pub fn not_found(what: &str) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        format!("{what} not found"),
    )
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Failure of a rule operation, reported with a `RULE_<ACTION>_FAILED` code.
pub fn rule_action_failed(action: RuleAction) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        action.error_code(),
        action.message(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Create,
    Update,
    Delete,
    Enable,
    Disable,
    Trigger,
}

impl RuleAction {
    fn error_code(self) -> &'static str {
        match self {
            RuleAction::Create => "RULE_CREATE_FAILED",
            RuleAction::Update => "RULE_UPDATE_FAILED",
            RuleAction::Delete => "RULE_DELETE_FAILED",
            RuleAction::Enable => "RULE_ENABLE_FAILED",
            RuleAction::Disable => "RULE_DISABLE_FAILED",
            RuleAction::Trigger => "RULE_TRIGGER_FAILED",
        }
    }

    fn message(self) -> &'static str {
        match self {
            RuleAction::Create => "Create failed.",
            RuleAction::Update => "Update failed.",
            RuleAction::Delete => "Delete failed.",
            RuleAction::Enable => "Enable failed.",
            RuleAction::Disable => "Disable failed.",
            RuleAction::Trigger => "Trigger failed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Test error message",
        );

        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.message, Box::from("Test error message"));
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_from_anyhow_hides_details() {
        let api_error: ApiError = anyhow::anyhow!("connection string leaked").into();

        assert_eq!(api_error.code, Box::from("INTERNAL_SERVER_ERROR"));
        assert_eq!(api_error.message, Box::from("An internal error occurred"));
    }

    #[test]
    fn test_problem_json_content_type() {
        let response = ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Try later",
        )
        .into_response();

        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_trace_id_fallback_format() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "bad");
        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[test]
    fn test_repository_error_mapping() {
        let api: ApiError = RepositoryError::not_found("rule").into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.message, Box::from("rule not found"));

        let api: ApiError = RepositoryError::validation_error("status cannot move back").into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, Box::from("VALIDATION_FAILED"));

        let api: ApiError = RepositoryError::Conflict("user".into()).into();
        assert_eq!(api.status, StatusCode::CONFLICT);

        let api: ApiError =
            RepositoryError::Database(sea_orm::DbErr::RecordNotFound("x".into())).into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);

        let api: ApiError = RepositoryError::PasswordHash("cost".into()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, Box::from("An internal error occurred"));
    }

    #[test]
    fn test_rule_action_failures() {
        let error = rule_action_failed(RuleAction::Trigger);
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.code, Box::from("RULE_TRIGGER_FAILED"));
        assert_eq!(error.message, Box::from("Trigger failed."));

        assert_eq!(
            rule_action_failed(RuleAction::Create).code,
            Box::from("RULE_CREATE_FAILED")
        );
    }
}
