use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::define::{PlayerId, ServerId, ServerType};
use crate::utils::now_timestamp;

/// 连接状态，重连视为新的连接
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Connected,
    Authenticated,
    Disconnected,
}

/// 网关会话
///
/// 随每次服务间调用一起发送，也是下线后写入缓存的会话记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// 会话所在网关实例
    pub gate_server_id: ServerId,
    pub remote_addr: Option<String>,
    pub user_id: Option<PlayerId>,
    pub state: SessionState,
    /// 各类服务的粘性路由
    #[serde(default)]
    pub routes: BTreeMap<ServerType, ServerId>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    pub connected_at: i64, // Unix timestamp
}

impl Session {
    pub fn new(gate_server_id: impl Into<ServerId>, remote_addr: Option<String>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            gate_server_id: gate_server_id.into(),
            remote_addr,
            user_id: None,
            state: SessionState::Connected,
            routes: BTreeMap::new(),
            settings: BTreeMap::new(),
            connected_at: now_timestamp(),
        }
    }

    pub fn bind(&mut self, user_id: PlayerId) {
        self.user_id = Some(user_id);
        self.state = SessionState::Authenticated;
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn route(&self, kind: ServerType) -> Option<&ServerId> {
        self.routes.get(&kind)
    }
}
