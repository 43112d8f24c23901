use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    // 账本错误 (调用方契约违规，总是同步返回)
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Invalid split strategy: {0}")]
    InvalidSplit(String),

    #[error("Shares are required for a custom split")]
    SharesRequired,

    #[error("Share amounts do not add up to the expense amount")]
    SharesMismatch,

    #[error("Percentages must add up to 100")]
    PercentMismatch,

    #[error("Share weights must add up to a positive total")]
    InvalidSharesTotal,

    #[error("User {0} is not a member of this group")]
    ShareMemberNotInGroup(String),

    #[error("Payer is not a member of this group")]
    PayerNotInGroup,

    #[error("Group not found")]
    GroupNotFound,

    #[error("User has no current group")]
    NoGroup,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Validation error: {0}")]
    ValidatorError(#[from] validator::ValidationErrors),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string(), "DATABASE_ERROR")
            }
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, msg.clone(), "AUTHENTICATION_ERROR")
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, msg.clone(), "AUTHORIZATION_ERROR")
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, msg.clone(), "NOT_FOUND")
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, msg.clone(), "CONFLICT")
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "BAD_REQUEST")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), "INTERNAL_ERROR")
            }
            AppError::ExternalService(msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, "External service error".to_string(), "EXTERNAL_SERVICE_ERROR")
            }
            AppError::InvalidAmount => {
                (StatusCode::BAD_REQUEST, self.to_string(), "INVALID_AMOUNT")
            }
            AppError::InvalidSplit(_) => {
                (StatusCode::BAD_REQUEST, self.to_string(), "INVALID_SPLIT")
            }
            AppError::SharesRequired => {
                (StatusCode::BAD_REQUEST, self.to_string(), "SHARES_REQUIRED")
            }
            AppError::SharesMismatch => {
                (StatusCode::BAD_REQUEST, self.to_string(), "SHARES_MISMATCH")
            }
            AppError::PercentMismatch => {
                (StatusCode::BAD_REQUEST, self.to_string(), "PERCENT_MISMATCH")
            }
            AppError::InvalidSharesTotal => {
                (StatusCode::BAD_REQUEST, self.to_string(), "INVALID_SHARES_TOTAL")
            }
            AppError::ShareMemberNotInGroup(_) => {
                (StatusCode::BAD_REQUEST, self.to_string(), "SHARE_MEMBER_NOT_IN_GROUP")
            }
            AppError::PayerNotInGroup => {
                (StatusCode::BAD_REQUEST, self.to_string(), "PAYER_NOT_IN_GROUP")
            }
            AppError::GroupNotFound => {
                (StatusCode::NOT_FOUND, self.to_string(), "GROUP_NOT_FOUND")
            }
            AppError::NoGroup => {
                (StatusCode::BAD_REQUEST, self.to_string(), "NO_GROUP")
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string(), "SERIALIZATION_ERROR")
            }
            AppError::Request(e) => {
                tracing::error!("Request error: {}", e);
                (StatusCode::BAD_GATEWAY, "Upstream request error".to_string(), "REQUEST_ERROR")
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string(), "JWT_ERROR")
            }
            AppError::ValidatorError(e) => {
                let validation_errors = e
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        (
                            field.to_string(),
                            errors.iter().map(|e| e.message.as_ref().unwrap_or(&"Invalid value".into()).to_string()).collect::<Vec<_>>()
                        )
                    })
                    .collect::<std::collections::HashMap<String, Vec<String>>>();

                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": {
                            "code": "VALIDATION_ERROR",
                            "message": "Validation failed",
                            "details": validation_errors
                        }
                    }))
                ).into_response();
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

// 便利函数，用于创建常见错误
impl AppError {
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{} not found", resource))
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::Authentication(msg.to_string())
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::Authorization(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        Self::Validation(msg.to_string())
    }
}

// 从其他错误类型转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
