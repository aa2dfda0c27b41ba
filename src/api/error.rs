use crate::application::lending::LendingError;
use crate::domain::UnknownTierError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(LendingError);

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError(err)
    }
}

impl From<UnknownTierError> for ApiError {
    fn from(err: UnknownTierError) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    /// ステータスコードとエラーコード
    fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            // 404 Not Found - リクエストされたリソースが存在しない
            LendingError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),

            // 409 Conflict - 現在の状態ではビジネスルール上受け付けられない
            LendingError::DuplicateEmail { .. } => (StatusCode::CONFLICT, "DUPLICATE_EMAIL"),
            LendingError::MemberInactive { .. } => (StatusCode::CONFLICT, "MEMBER_INACTIVE"),
            LendingError::BorrowingLimitExceeded { .. } => {
                (StatusCode::CONFLICT, "BORROWING_LIMIT_EXCEEDED")
            }
            LendingError::BookUnavailable { .. } => (StatusCode::CONFLICT, "BOOK_UNAVAILABLE"),
            LendingError::AlreadyReturned { .. } => (StatusCode::CONFLICT, "ALREADY_RETURNED"),
            LendingError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),

            // 400 Bad Request - 入力値の誤り
            LendingError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            LendingError::UnknownTier(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_TIER"),
            LendingError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),

            // 500 Internal Server Error - システム障害
            LendingError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            LendingError::BookService(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "BOOK_SERVICE_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();

        let message = if status.is_server_error() {
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            tracing::error!(error = ?self.0, "request failed: {}", self.0);
            "An unexpected error occurred".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
