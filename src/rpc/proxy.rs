use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde_json::Value;

use super::{RpcError, RpcMessage, ServiceBus};
use crate::define::{ServerId, ServerType, msg_type};
use crate::gate::Session;

/// 带会话粘性路由的服务调用
///
/// 玩家第一次访问某类服务时随机选一个实例记录在会话里，之后一直使用该实例，
/// 直到它不可用才重新选择。路由变化会同步回玩家所在的网关。
#[derive(Clone)]
pub struct ServiceProxy {
    bus: Arc<dyn ServiceBus>,
}

impl ServiceProxy {
    pub fn new(bus: Arc<dyn ServiceBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<dyn ServiceBus> {
        &self.bus
    }

    /// 确定会话访问某类服务的目标实例，路由发生变化时第二个返回值为 true
    pub async fn resolve_route(
        &self,
        session: &mut Session,
        kind: ServerType,
    ) -> Result<(ServerId, bool), RpcError> {
        if let Some(server_id) = session.route(kind) {
            if self.bus.is_alive(server_id).await {
                return Ok((server_id.clone(), false));
            }
            tracing::warn!(
                "session {} lost route {} -> {}, choosing a new server",
                session.session_id,
                kind,
                server_id
            );
        }

        let servers = self.bus.servers_by_type(kind).await;
        let server_id = pick_server(&servers).ok_or(RpcError::NoServer(kind))?;
        session.routes.insert(kind, server_id.clone());
        Ok((server_id, true))
    }

    /// 调用并等待返回
    pub async fn call(
        &self,
        session: &mut Session,
        kind: ServerType,
        handler: &str,
        payload: Value,
    ) -> Result<Value, RpcError> {
        let server_id = self.route_and_sync(session, kind).await?;
        self.bus
            .call(&server_id, handler, RpcMessage::new(Some(session.clone()), payload))
            .await
    }

    /// 只投递不等待返回
    pub async fn invoke_nr(
        &self,
        session: &mut Session,
        kind: ServerType,
        handler: &str,
        payload: Value,
    ) -> Result<(), RpcError> {
        let server_id = self.route_and_sync(session, kind).await?;
        self.bus
            .call_nr(&server_id, handler, RpcMessage::new(Some(session.clone()), payload))
            .await
    }

    async fn route_and_sync(&self, session: &mut Session, kind: ServerType) -> Result<ServerId, RpcError> {
        let (server_id, changed) = self.resolve_route(session, kind).await?;
        if changed {
            self.push_session(session).await;
        }
        Ok(server_id)
    }

    /// 把会话的路由信息同步到网关，失败只记录日志
    pub async fn push_session(&self, session: &Session) {
        let result = self
            .bus
            .call(
                &session.gate_server_id,
                msg_type::RPC_PUSH_SESSION,
                RpcMessage::with_session(session.clone()),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!("push session {} to gate failed: {}", session.session_id, e);
        }
    }
}

fn pick_server(servers: &[ServerId]) -> Option<ServerId> {
    servers.choose(&mut rand::rng()).cloned()
}
