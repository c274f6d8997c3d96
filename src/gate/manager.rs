use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;

use super::{RouteError, RouteOutcome, Session, SessionState, Topic};
use crate::cache::{KeyValueCache, SessionCacheOperations};
use crate::define::{PlayerId, ServerId, ServerType, msg_type};
use crate::error::StoreError;
use crate::rpc::{RpcError, RpcHandler, RpcMessage, ServiceBus, ServiceProxy};

/// 玩家下线时需要通知的服务类型
pub const LOGOUT_LISTENERS: [ServerType; 3] = [ServerType::Login, ServerType::DBSvr, ServerType::Hall];

#[derive(Debug, Deserialize)]
struct BindSessionRequest {
    session_id: String,
    user_id: PlayerId,
}

#[derive(Debug, Deserialize)]
struct CloseSessionRequest {
    session_id: String,
}

/// 网关会话管理
pub struct GateManager {
    server_id: ServerId,
    sessions: Mutex<HashMap<String, Session>>,
    session_cache: SessionCacheOperations,
    proxy: ServiceProxy,
    /// 下线后会话记录的保留时长
    grace: Duration,
}

impl GateManager {
    pub fn new(
        server_id: impl Into<ServerId>,
        cache: Arc<dyn KeyValueCache>,
        bus: Arc<dyn ServiceBus>,
        grace: Duration,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            sessions: Mutex::new(HashMap::new()),
            session_cache: SessionCacheOperations::new(cache),
            proxy: ServiceProxy::new(bus),
            grace,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// 新连接，认证前不产生任何外部副作用
    pub fn on_connect(&self, remote_addr: Option<String>) -> Session {
        let session = Session::new(self.server_id.clone(), remote_addr);
        self.sessions
            .lock()
            .insert(session.session_id.clone(), session.clone());
        tracing::debug!("session {} connected", session.session_id);
        session
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// 连接断开
    ///
    /// 已认证的会话先写入缓存再设置保留时长，然后通知各服务玩家下线。
    pub async fn on_disconnect(&self, session_id: &str) -> Option<Session> {
        let mut session = self.sessions.lock().remove(session_id)?;
        session.state = SessionState::Disconnected;

        let Some(user_id) = session.user_id else {
            tracing::debug!("anonymous session {} disconnected", session_id);
            return Some(session);
        };

        if let Err(e) = self.persist_session(user_id, &session).await {
            tracing::error!("failed to persist session of user {}: {}", user_id, e);
        }
        self.broadcast_logout(&session).await;

        tracing::info!("user {} disconnected from {}", user_id, self.server_id);
        Some(session)
    }

    async fn persist_session(&self, user_id: PlayerId, session: &Session) -> Result<(), StoreError> {
        self.session_cache.cache_session(user_id, session).await?;
        self.session_cache.expire_session(user_id, self.grace).await?;
        Ok(())
    }

    /// 通知每个有路由记录的服务，单个目标失败不影响其他目标
    async fn broadcast_logout(&self, session: &Session) {
        let bus = self.proxy.bus();
        let notifications = LOGOUT_LISTENERS.into_iter().filter_map(|kind| {
            let server_id = session.route(kind)?.clone();
            let msg = RpcMessage::with_session(session.clone());
            Some(async move {
                let result = bus.call_nr(&server_id, msg_type::RPC_USER_LOGOUT, msg).await;
                (kind, server_id, result)
            })
        });

        for (kind, server_id, result) in join_all(notifications).await {
            if let Err(e) = result {
                tracing::warn!(
                    "failed to notify {} ({}) of logout of session {}: {}",
                    kind,
                    server_id,
                    session.session_id,
                    e
                );
            }
        }
    }

    /// 转发客户端消息
    pub async fn route_inbound(
        &self,
        session_id: &str,
        topic: &str,
        payload: Value,
    ) -> Result<RouteOutcome, RouteError> {
        let topic: Topic = topic.parse()?;
        let mut session = self
            .session(session_id)
            .ok_or_else(|| RouteError::SessionNotFound(session_id.to_string()))?;

        let (server_id, changed) = self.proxy.resolve_route(&mut session, topic.service).await?;
        if changed {
            self.update_routes(&session);
        }

        let msg = RpcMessage::new(Some(session), payload);
        let bus = self.proxy.bus();
        if topic.expects_reply() {
            let reply = bus.call(&server_id, &topic.handler, msg).await?;
            Ok(RouteOutcome::Reply(reply))
        } else {
            bus.call_nr(&server_id, &topic.handler, msg).await?;
            Ok(RouteOutcome::Forwarded)
        }
    }

    fn update_routes(&self, session: &Session) {
        if let Some(current) = self.sessions.lock().get_mut(&session.session_id) {
            current.routes.extend(session.routes.clone());
        }
    }

    /// 绑定玩家ID
    pub fn bind(&self, session_id: &str, user_id: PlayerId) -> Option<Session> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(session_id)?;
        session.bind(user_id);
        tracing::info!("session {} bound to user {}", session_id, user_id);
        Some(session.clone())
    }

    /// 其他服务同步回来的路由与设置
    pub fn push(&self, session: &Session) -> bool {
        match self.sessions.lock().get_mut(&session.session_id) {
            Some(current) => {
                current.routes.extend(session.routes.clone());
                current.settings.extend(session.settings.clone());
                true
            }
            None => false,
        }
    }

    /// 关闭被顶替的会话
    ///
    /// 玩家仍通过新会话在线，因此不写会话记录也不广播下线。
    pub fn close(&self, session_id: &str) -> Option<Session> {
        let mut session = self.sessions.lock().remove(session_id)?;
        session.state = SessionState::Disconnected;
        tracing::info!("session {} closed by takeover", session_id);
        Some(session)
    }

    /// 查询玩家最近的会话记录，用于判断是否刚刚在线
    pub async fn query_session(&self, user_id: PlayerId) -> Option<Session> {
        match self.session_cache.get_session(user_id).await {
            Ok(session) => session,
            Err(StoreError::Serialization(e)) => {
                tracing::error!("corrupt session record of user {}: {}", user_id, e);
                None
            }
            Err(e) => {
                tracing::warn!("failed to query session of user {}: {}", user_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl RpcHandler for GateManager {
    async fn handle(&self, handler: &str, msg: RpcMessage) -> Result<Value, RpcError> {
        match handler {
            msg_type::RPC_BIND_SESSION => {
                let req: BindSessionRequest = msg.payload_as()?;
                let session = self
                    .bind(&req.session_id, req.user_id)
                    .ok_or_else(|| RpcError::Handler(format!("session {} not found", req.session_id)))?;
                serde_json::to_value(session).map_err(|e| RpcError::Handler(e.to_string()))
            }
            msg_type::RPC_PUSH_SESSION => Ok(Value::Bool(self.push(msg.require_session()?))),
            msg_type::RPC_CLOSE_SESSION => {
                let req: CloseSessionRequest = msg.payload_as()?;
                Ok(Value::Bool(self.close(&req.session_id).is_some()))
            }
            other => Err(RpcError::UnknownHandler(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::rpc::LocalBus;
    use tokio::sync::mpsc;

    /// 记录收到的消息
    struct Recorder {
        name: &'static str,
        tx: mpsc::UnboundedSender<(&'static str, String, Option<Session>)>,
    }

    #[async_trait]
    impl RpcHandler for Recorder {
        async fn handle(&self, handler: &str, msg: RpcMessage) -> Result<Value, RpcError> {
            let _ = self.tx.send((self.name, handler.to_string(), msg.session));
            Ok(Value::String(format!("{}:{}", self.name, handler)))
        }
    }

    struct Fixture {
        gate: Arc<GateManager>,
        cache: Arc<MemoryCache>,
        bus: Arc<LocalBus>,
        rx: mpsc::UnboundedReceiver<(&'static str, String, Option<Session>)>,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(MemoryCache::new());
        let bus = Arc::new(LocalBus::new());
        let gate = Arc::new(GateManager::new(
            "Gate@1",
            cache.clone(),
            bus.clone(),
            Duration::from_secs(600),
        ));
        bus.register("Gate@1", ServerType::Gate, gate.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        for (id, kind) in [
            ("Login@1", ServerType::Login),
            ("DBSvr@1", ServerType::DBSvr),
            ("Hall@1", ServerType::Hall),
        ] {
            bus.register(id, kind, Arc::new(Recorder { name: id, tx: tx.clone() }));
        }
        Fixture { gate, cache, bus, rx }
    }

    async fn next_call(
        rx: &mut mpsc::UnboundedReceiver<(&'static str, String, Option<Session>)>,
    ) -> (&'static str, String, Option<Session>) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("call delivered")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_on_disconnect_anonymous_persists_nothing() {
        let mut f = fixture();
        let session = f.gate.on_connect(Some("127.0.0.1:5000".into()));

        let closed = f.gate.on_disconnect(&session.session_id).await.unwrap();
        assert_eq!(closed.state, SessionState::Disconnected);
        assert_eq!(f.gate.session_count(), 0);
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_on_disconnect_authenticated_persists_and_broadcasts() {
        let mut f = fixture();
        let session = f.gate.on_connect(None);
        f.gate.bind(&session.session_id, PlayerId(1001)).unwrap();
        let mut routed = f.gate.session(&session.session_id).unwrap();
        routed.routes.insert(ServerType::DBSvr, "DBSvr@1".into());
        routed.routes.insert(ServerType::Hall, "Hall@1".into());
        assert!(f.gate.push(&routed));

        f.gate.on_disconnect(&session.session_id).await.unwrap();

        let stored = f.gate.query_session(PlayerId(1001)).await.unwrap();
        assert_eq!(stored.session_id, session.session_id);
        assert_eq!(stored.state, SessionState::Disconnected);
        let ttl = f.cache.ttl("session:1001").await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(590) && ttl <= Duration::from_secs(600));

        let mut notified = vec![next_call(&mut f.rx).await, next_call(&mut f.rx).await];
        notified.sort_by_key(|(name, _, _)| *name);
        assert_eq!(notified[0].0, "DBSvr@1");
        assert_eq!(notified[1].0, "Hall@1");
        for (_, handler, session) in &notified {
            assert_eq!(handler, msg_type::RPC_USER_LOGOUT);
            assert_eq!(session.as_ref().unwrap().user_id, Some(PlayerId(1001)));
        }
        // Login 没有路由记录，不通知
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_on_disconnect_one_failing_target_does_not_block_others() {
        let mut f = fixture();
        let session = f.gate.on_connect(None);
        f.gate.bind(&session.session_id, PlayerId(7)).unwrap();
        let mut routed = f.gate.session(&session.session_id).unwrap();
        routed.routes.insert(ServerType::DBSvr, "DBSvr@1".into());
        routed.routes.insert(ServerType::Hall, "Hall@1".into());
        f.gate.push(&routed);
        f.bus.set_alive("DBSvr@1", false);

        f.gate.on_disconnect(&session.session_id).await.unwrap();

        let (name, handler, _) = next_call(&mut f.rx).await;
        assert_eq!(name, "Hall@1");
        assert_eq!(handler, msg_type::RPC_USER_LOGOUT);
    }

    #[tokio::test]
    async fn test_route_inbound_reply_and_affinity() {
        let mut f = fixture();
        let session = f.gate.on_connect(None);

        let outcome = f
            .gate
            .route_inbound(&session.session_id, "Hall/enterRoom/1", Value::Null)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RouteOutcome::Reply(Value::String("Hall@1:enterRoom".into()))
        );
        let (_, _, forwarded) = next_call(&mut f.rx).await;
        assert_eq!(forwarded.unwrap().session_id, session.session_id);

        let stored = f.gate.session(&session.session_id).unwrap();
        assert_eq!(stored.route(ServerType::Hall).map(String::as_str), Some("Hall@1"));

        let outcome = f
            .gate
            .route_inbound(&session.session_id, "Hall/chat", Value::Null)
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Forwarded);
    }

    #[tokio::test]
    async fn test_route_inbound_reports_errors() {
        let f = fixture();
        let session = f.gate.on_connect(None);

        assert!(matches!(
            f.gate.route_inbound(&session.session_id, "Chat/say", Value::Null).await,
            Err(RouteError::UnknownService(_))
        ));
        assert!(matches!(
            f.gate.route_inbound("missing", "Hall/chat", Value::Null).await,
            Err(RouteError::SessionNotFound(_))
        ));

        f.bus.set_alive("Hall@1", false);
        assert!(matches!(
            f.gate.route_inbound(&session.session_id, "Hall/chat", Value::Null).await,
            Err(RouteError::Rpc(RpcError::NoServer(ServerType::Hall)))
        ));
    }

    #[tokio::test]
    async fn test_close_removes_session_without_broadcast() {
        let mut f = fixture();
        let session = f.gate.on_connect(None);
        f.gate.bind(&session.session_id, PlayerId(3)).unwrap();
        let mut routed = f.gate.session(&session.session_id).unwrap();
        routed.routes.insert(ServerType::Hall, "Hall@1".into());
        f.gate.push(&routed);

        let reply = f
            .gate
            .handle(
                msg_type::RPC_CLOSE_SESSION,
                RpcMessage::new(None, serde_json::json!({ "session_id": session.session_id })),
            )
            .await
            .unwrap();
        assert_eq!(reply, Value::Bool(true));
        assert!(f.gate.session(&session.session_id).is_none());
        assert!(f.gate.on_disconnect(&session.session_id).await.is_none());
        assert_eq!(f.gate.query_session(PlayerId(3)).await, None);
        assert!(f.rx.try_recv().is_err());
    }
}
