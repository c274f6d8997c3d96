//! 服务间调用。
//!
//! 消息投递和集群成员管理由外部组件负责，这里只定义各服务依赖的接口：
//! 同一对调用方/被调用方之间按发送顺序投递，至少投递一次。

pub mod local;
pub mod proxy;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::define::{ServerId, ServerType};
use crate::gate::Session;

pub use local::LocalBus;
pub use proxy::ServiceProxy;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("no available server for {0}")]
    NoServer(ServerType),

    #[error("server {0} is unavailable")]
    ServerUnavailable(ServerId),

    #[error("unknown handler {0}")]
    UnknownHandler(String),

    #[error("bad payload: {0}")]
    BadPayload(String),

    #[error("missing session")]
    MissingSession,

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("server {0} dropped the call")]
    Dropped(ServerId),
}

/// 一次调用携带的内容：调用方的会话快照和参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    pub session: Option<Session>,
    pub payload: Value,
}

impl RpcMessage {
    pub fn new(session: Option<Session>, payload: Value) -> Self {
        Self { session, payload }
    }

    pub fn with_session(session: Session) -> Self {
        Self::new(Some(session), Value::Null)
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| RpcError::BadPayload(e.to_string()))
    }

    pub fn require_session(&self) -> Result<&Session, RpcError> {
        self.session.as_ref().ok_or(RpcError::MissingSession)
    }
}

/// 服务发现与调用
#[async_trait]
pub trait ServiceBus: Send + Sync {
    /// 某类型当前可用的实例
    async fn servers_by_type(&self, kind: ServerType) -> Vec<ServerId>;

    async fn is_alive(&self, server_id: &str) -> bool;

    /// 调用并等待返回
    async fn call(&self, server_id: &str, handler: &str, msg: RpcMessage)
    -> Result<Value, RpcError>;

    /// 只投递不等待返回
    async fn call_nr(&self, server_id: &str, handler: &str, msg: RpcMessage)
    -> Result<(), RpcError>;
}

/// 服务端消息处理
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, handler: &str, msg: RpcMessage) -> Result<Value, RpcError>;
}
