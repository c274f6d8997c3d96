//! 进程内的服务总线，所有服务运行在同一进程时使用。
//!
//! 每个实例一个投递队列：同一实例按发送顺序收到消息，每条消息在独立的任务中处理。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::{RpcError, RpcHandler, RpcMessage, ServiceBus};
use crate::define::{ServerId, ServerType};

struct Envelope {
    handler: String,
    msg: RpcMessage,
    reply: Option<oneshot::Sender<Result<Value, RpcError>>>,
}

struct ServerEntry {
    kind: ServerType,
    alive: bool,
    tx: mpsc::UnboundedSender<Envelope>,
}

#[derive(Default)]
pub struct LocalBus {
    servers: RwLock<BTreeMap<ServerId, ServerEntry>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册服务实例并启动它的投递任务，需要在 tokio 运行时中调用
    pub fn register(&self, server_id: impl Into<ServerId>, kind: ServerType, handler: Arc<dyn RpcHandler>) {
        let server_id = server_id.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

        let worker_id = server_id.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let handler = Arc::clone(&handler);
                let server_id = worker_id.clone();
                tokio::spawn(async move {
                    let Envelope { handler: name, msg, reply } = envelope;
                    let result = handler.handle(&name, msg).await;
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                tracing::warn!("{} failed to handle {}: {}", server_id, name, e);
                            }
                        }
                    }
                });
            }
            tracing::debug!("{} delivery queue closed", worker_id);
        });

        tracing::info!("{} registered as {}", server_id, kind);
        self.servers.write().insert(
            server_id,
            ServerEntry {
                kind,
                alive: true,
                tx,
            },
        );
    }

    /// 标记实例上下线，下线实例不再接收消息
    pub fn set_alive(&self, server_id: &str, alive: bool) {
        if let Some(entry) = self.servers.write().get_mut(server_id) {
            entry.alive = alive;
            tracing::info!("{} is now {}", server_id, if alive { "online" } else { "offline" });
        }
    }

    fn deliver(&self, server_id: &str, envelope: Envelope) -> Result<(), RpcError> {
        let servers = self.servers.read();
        let entry = servers
            .get(server_id)
            .filter(|entry| entry.alive)
            .ok_or_else(|| RpcError::ServerUnavailable(server_id.to_string()))?;
        entry
            .tx
            .send(envelope)
            .map_err(|_| RpcError::ServerUnavailable(server_id.to_string()))
    }
}

#[async_trait]
impl ServiceBus for LocalBus {
    async fn servers_by_type(&self, kind: ServerType) -> Vec<ServerId> {
        self.servers
            .read()
            .iter()
            .filter(|(_, entry)| entry.kind == kind && entry.alive)
            .map(|(id, _)| id.clone())
            .collect()
    }

    async fn is_alive(&self, server_id: &str) -> bool {
        self.servers
            .read()
            .get(server_id)
            .is_some_and(|entry| entry.alive)
    }

    async fn call(&self, server_id: &str, handler: &str, msg: RpcMessage) -> Result<Value, RpcError> {
        let (tx, rx) = oneshot::channel();
        self.deliver(
            server_id,
            Envelope {
                handler: handler.to_string(),
                msg,
                reply: Some(tx),
            },
        )?;
        rx.await
            .map_err(|_| RpcError::Dropped(server_id.to_string()))?
    }

    async fn call_nr(&self, server_id: &str, handler: &str, msg: RpcMessage) -> Result<(), RpcError> {
        self.deliver(
            server_id,
            Envelope {
                handler: handler.to_string(),
                msg,
                reply: None,
            },
        )
    }
}
