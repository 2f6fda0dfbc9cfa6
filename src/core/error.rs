//! 核心错误处理模块

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::infrastructure::backend::{AuthError, StoreError};

/// 核心错误类型
///
/// 配置、认证、订阅三类在管理面板中是整屏致命错误；
/// 校验与提交两类只在表单附近内联显示。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Backend configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to load products: {0}")]
    Subscription(StoreError),

    #[error("{0}")]
    Validation(String),

    #[error("Failed to add product: {0}")]
    Submission(StoreError),

    #[error("A submission is already in progress")]
    SubmissionInFlight,
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::Auth(_) => "AUTH_ERROR",
            CoreError::Subscription(_) => "SUBSCRIPTION_ERROR",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Submission(_) => "SUBMISSION_ERROR",
            CoreError::SubmissionInFlight => "SUBMISSION_IN_FLIGHT",
        }
    }

    /// 是否应整屏显示
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::Config(_) | CoreError::Auth(_) | CoreError::Subscription(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Auth(_) => StatusCode::UNAUTHORIZED,
            CoreError::Subscription(StoreError::PermissionDenied)
            | CoreError::Submission(StoreError::PermissionDenied) => StatusCode::FORBIDDEN,
            CoreError::Subscription(_) => StatusCode::BAD_GATEWAY,
            CoreError::Submission(StoreError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            CoreError::Submission(_) => StatusCode::BAD_GATEWAY,
            CoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::SubmissionInFlight => StatusCode::CONFLICT,
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = err.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let messages: Vec<String> = fields
            .into_iter()
            .flat_map(|(_, errors)| {
                errors.iter().map(|error| {
                    error
                        .message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| "Validation error".to_string())
                })
            })
            .collect();

        CoreError::Validation(messages.join(" "))
    }
}

/// 错误响应结构
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
    pub timestamp: String,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), "{}", self);
        }

        let error_response = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            code: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_categories() {
        assert!(CoreError::Config("missing".into()).is_fatal());
        assert!(CoreError::Auth(AuthError::InvalidCustomToken).is_fatal());
        assert!(CoreError::Subscription(StoreError::PermissionDenied).is_fatal());
        assert!(!CoreError::Validation("bad".into()).is_fatal());
        assert!(!CoreError::Submission(StoreError::PermissionDenied).is_fatal());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            CoreError::Submission(StoreError::PermissionDenied).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            CoreError::Validation("bad".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(CoreError::SubmissionInFlight.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_permission_message_is_preserved() {
        let err = CoreError::Submission(StoreError::PermissionDenied);
        assert_eq!(
            err.to_string(),
            "Failed to add product: Missing or insufficient permissions."
        );
    }
}
