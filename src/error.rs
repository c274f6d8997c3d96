use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::utils::error_codes;

/// 缓存与数据库访问错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to decompress stored data: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// 账号认证错误，调用方统一按登录失败处理
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("password task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// HTTP 接口错误
#[derive(Debug)]
pub enum AppError {
    SessionNotFound,
    InvalidTopic(String),
    RouteFailed(String),
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::SessionNotFound => (
                StatusCode::NOT_FOUND,
                error_codes::NOT_FOUND,
                "会话不存在".to_string(),
            ),
            AppError::InvalidTopic(topic) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                format!("消息主题无效: {}", topic),
            ),
            AppError::RouteFailed(reason) => (
                StatusCode::BAD_GATEWAY,
                error_codes::ROUTE_FAILED,
                format!("消息路由失败: {}", reason),
            ),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "内部服务器错误".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code,
            error_message,
        });

        (status, body).into_response()
    }
}
