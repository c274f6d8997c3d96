use serde::{Deserialize, Serialize};

use crate::define::PlayerId;

/// 账号缓存数据模型
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CachedAccount {
    pub user_id: PlayerId,
    pub account: String,
    /// bcrypt 哈希，不保存明文密码
    pub password_hash: String,
    pub created_at: i64, // Unix timestamp
}
