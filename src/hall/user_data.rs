use serde::{Deserialize, Serialize};

use crate::define::PlayerId;
use crate::utils::now_timestamp;

/// 玩家角色数据，保存在 ROLE_DATA 中
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HallUserData {
    #[serde(rename = "UserID")]
    pub user_id: PlayerId,
    pub name: String,
    pub level: i32,
    pub money: i32,
    pub game_icon: u32,
    pub register_time: i64,
    pub last_login_time: i64,
    pub last_logout_time: i64,
}

impl HallUserData {
    /// 第一次进入大厅的玩家
    pub fn new(user_id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            register_time: now_timestamp(),
            ..Default::default()
        }
    }

    /// 空数据（包括 `{}`）视为未注册
    pub fn is_registered(&self) -> bool {
        self.register_time != 0
    }
}
