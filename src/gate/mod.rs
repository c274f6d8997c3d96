// 网关模块
// 管理客户端会话，负责会话持久化和消息路由

pub mod manager;
pub mod session;
pub mod topic;

use serde_json::Value;

use crate::rpc::RpcError;

pub use manager::GateManager;
pub use session::{Session, SessionState};
pub use topic::Topic;

/// 路由失败原因，返回给客户端而不是静默丢弃
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// 路由结果
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// 已投递，不等待回复
    Forwarded,
    /// 目标服务的回复
    Reply(Value),
}
