//! HTTP 错误响应
//!
//! 所有错误响应体都包含 `detail` 字段。

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::translation::error::{helpers, TranslationError};

/// 服务繁忙时返回给客户端的提示
pub const BUSY_DETAIL: &str = "Server is busy. Please try again later.";

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    Service(TranslationError),
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Service(error) => match error {
                TranslationError::Overloaded { .. }
                | TranslationError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                e if e.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<TranslationError> for ApiError {
    fn from(error: TranslationError) -> Self {
        ApiError::Service(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error = match self {
            ApiError::NotFound(detail) => {
                return (status, Json(json!({ "detail": detail }))).into_response();
            }
            ApiError::Service(error) => error,
        };

        helpers::log_error(&error);

        match error {
            TranslationError::Overloaded { waited } => {
                let retry_after = waited.as_secs().max(1);
                let mut response = (status, Json(json!({ "detail": BUSY_DETAIL }))).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            TranslationError::RateLimitExceeded { retry_after_secs } => {
                let body = json!({
                    "detail": format!("Too Many Requests, retry after {}", retry_after_secs),
                    "retry_after": retry_after_secs,
                });
                let mut response = (status, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            other => (status, Json(json!({ "detail": other.to_string() }))).into_response(),
        }
    }
}
