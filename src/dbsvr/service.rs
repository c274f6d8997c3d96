use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;

use super::DbManager;
use crate::define::{PlayerId, msg_type};
use crate::rpc::{RpcError, RpcHandler, RpcMessage};

#[derive(Debug, Deserialize)]
struct LoadUserInfoRequest {
    user_id: PlayerId,
}

/// 数据服消息处理
///
/// 记录每个玩家最近一次加载数据时的会话，旧会话迟到的下线消息直接忽略，
/// 避免把刚重新登录的玩家数据写回并清掉。
pub struct DbSvrService {
    manager: Arc<DbManager>,
    sessions: Mutex<HashMap<PlayerId, String>>,
}

impl DbSvrService {
    pub fn new(manager: Arc<DbManager>) -> Self {
        Self {
            manager,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn manager(&self) -> &Arc<DbManager> {
        &self.manager
    }

    async fn load_user_info(&self, user_id: PlayerId, session_id: Option<&str>) -> Result<bool, RpcError> {
        if let Some(session_id) = session_id {
            self.sessions.lock().insert(user_id, session_id.to_string());
        }
        self.manager
            .on_user_login(user_id)
            .await
            .map_err(|e| RpcError::Handler(e.to_string()))
    }

    fn user_logout(&self, user_id: PlayerId, session_id: &str) {
        {
            let mut sessions = self.sessions.lock();
            match sessions.get(&user_id) {
                Some(current) if current != session_id => {
                    tracing::debug!("ignoring logout of stale session {} for user {}", session_id, user_id);
                    return;
                }
                _ => {
                    sessions.remove(&user_id);
                }
            }
        }
        self.manager.on_user_logout(user_id);
    }
}

#[async_trait]
impl RpcHandler for DbSvrService {
    async fn handle(&self, handler: &str, msg: RpcMessage) -> Result<Value, RpcError> {
        match handler {
            msg_type::RPC_LOAD_USER_INFO_FROM_DB => {
                let req: LoadUserInfoRequest = msg.payload_as()?;
                let session_id = msg.session.as_ref().map(|s| s.session_id.as_str());
                self.load_user_info(req.user_id, session_id).await.map(Value::Bool)
            }
            msg_type::RPC_USER_LOGOUT => {
                let session = msg.require_session()?;
                match session.user_id {
                    Some(user_id) => self.user_logout(user_id, &session.session_id),
                    None => tracing::warn!("logout of anonymous session {}", session.session_id),
                }
                Ok(Value::Null)
            }
            other => Err(RpcError::UnknownHandler(other.to_string())),
        }
    }
}
