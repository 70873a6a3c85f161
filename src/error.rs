use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Already active: {0}")]
    AlreadyActive(String),

    #[error("Not active: {0}")]
    NotActive(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn forbidden() -> Self {
        AppError::Forbidden("Forbidden".to_string())
    }

    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Unauthorized | AppError::Jwt(_) => "UNAUTHORIZED",
            AppError::NotFound => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "ALREADY_EXISTS",
            AppError::AlreadyActive(_) => "ALREADY_ACTIVE",
            AppError::NotActive(_) => "NOT_ACTIVE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::AlreadyActive(_) | AppError::NotActive(_) => {
                StatusCode::CONFLICT
            }
        }
    }
}

/// Map a unique-constraint violation on a fact insert to `AlreadyActive`,
/// leaving every other storage error untouched.
pub fn map_unique_violation(err: DbErr, message: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::AlreadyActive(message.to_string()),
        _ => AppError::Database(err),
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
}

impl utoipa::ToSchema for AppError {
    fn name() -> std::borrow::Cow<'static, str> {
        "ErrorResponse".into()
    }
}

impl utoipa::PartialSchema for AppError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        ErrorResponse::schema()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                "Invalid token".to_string()
            }
            AppError::NotFound => "Resource not found".to_string(),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::AlreadyActive(msg)
            | AppError::NotActive(msg) => msg,
        };

        let body = json!({
            "success": false,
            "code": code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_errors_have_distinct_codes() {
        assert_eq!(AppError::AlreadyActive("x".into()).code(), "ALREADY_ACTIVE");
        assert_eq!(AppError::NotActive("x".into()).code(), "NOT_ACTIVE");
        assert_eq!(AppError::Conflict("x".into()).code(), "ALREADY_EXISTS");
    }

    #[test]
    fn storage_errors_downgrade_to_internal() {
        let err = AppError::Database(DbErr::Custom("boom".into()));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn hidden_entities_report_not_found() {
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::forbidden().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn non_unique_db_errors_pass_through() {
        let err = map_unique_violation(DbErr::Custom("other".into()), "Already liked");
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn error_body_carries_code_and_message() {
        let response = AppError::Validation("Cannot follow yourself".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
