use axum::Json;
use bcrypt::{hash, verify};
use serde::Serialize;

use crate::result::ApiResult;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// 当前 Unix 时间戳（秒）
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResult<T>> {
    Json(ApiResult::success(data))
}

pub fn error_to_api_response<T: Serialize>(code: i32, msg: &str) -> Json<ApiResult<T>> {
    Json(ApiResult::error(code, msg))
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    /// 登录失败，不区分账号不存在与密码错误
    pub const LOGIN_FAILED: i32 = 1;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const NOT_FOUND: i32 = 1004;
    pub const ROUTE_FAILED: i32 = 1006;
    pub const INTERNAL_ERROR: i32 = 5000;
}
