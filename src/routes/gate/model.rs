use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::define::PlayerId;

// 连接响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub session_id: String,
}

// 客户端消息，topic 格式为 service/handler[/msgId]
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub session_id: String,
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub session_id: String,
    pub user_id: Option<PlayerId>,
}
