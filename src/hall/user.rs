use super::HallUserData;
use crate::gate::Session;
use crate::utils::now_timestamp;

/// 在线玩家
#[derive(Debug, Clone)]
pub struct HallUser {
    pub user_data: HallUserData,
    pub session: Session,
}

impl HallUser {
    pub fn new(user_data: HallUserData, session: Session) -> Self {
        Self { user_data, session }
    }

    pub fn on_login(&mut self) {
        self.user_data.last_login_time = now_timestamp();
    }

    pub fn on_logout(&mut self) {
        self.user_data.last_logout_time = now_timestamp();
    }

    /// 写入缓存的数据
    pub fn get_user_save_data(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.user_data)
    }
}
