use crate::define::PlayerId;

/// 会话缓存键前缀
const SESSION_PREFIX: &str = "session:";

/// 生成会话缓存键
pub fn session_key(user_id: PlayerId) -> String {
    format!("{}{}", SESSION_PREFIX, user_id)
}

/// 生成玩家系统数据缓存键，例如 `ROLE_DATA:1001`
pub fn user_data_key(system_name: &str, user_id: PlayerId) -> String {
    format!("{}:{}", system_name, user_id)
}
