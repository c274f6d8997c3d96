use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::{HallUser, HallUserData, HallUserManager};
use crate::cache::{KeyValueCache, UserDataCacheOperations};
use crate::define::{PlayerId, USER_DATA_ROLE, msg_type};
use crate::gate::Session;
use crate::rpc::{RpcError, RpcHandler, RpcMessage, ServiceBus};

#[derive(Debug, Deserialize)]
struct LoginSuccessRequest {
    name: String,
}

/// 大厅服务
///
/// 在线玩家表由一把锁保护，加载、登记、保存在同一次加锁内完成。
pub struct HallService {
    users: Mutex<HallUserManager>,
    user_data: UserDataCacheOperations,
    bus: Arc<dyn ServiceBus>,
}

impl HallService {
    pub fn new(cache: Arc<dyn KeyValueCache>, bus: Arc<dyn ServiceBus>) -> Self {
        Self {
            users: Mutex::new(HallUserManager::new()),
            user_data: UserDataCacheOperations::new(cache),
            bus,
        }
    }

    /// 登录成功后进入大厅，角色数据必须已由数据服加载进缓存
    pub async fn on_user_login_success(&self, session: Session, name: &str) -> bool {
        let Some(user_id) = session.user_id else {
            tracing::warn!("session {} entered hall without user id", session.session_id);
            return false;
        };

        let mut users = self.users.lock().await;
        let Some(user_data) = self.load_user_data(user_id).await else {
            tracing::warn!("role data of user {} is not loaded", user_id);
            return false;
        };
        let user_data = if user_data.is_registered() {
            user_data
        } else {
            HallUserData::new(user_id, name)
        };

        let evicted = users.on_user_login(user_data, session);
        let Some(user) = users.get_user_mut(user_id) else {
            return false;
        };
        user.on_login();
        self.save_user(user).await;
        let online = users.get_user_count();
        drop(users);

        if let Some(evicted) = evicted {
            self.close_session(user_id, &evicted).await;
        }

        tracing::info!("user {} ({}) entered hall, online: {}", user_id, name, online);
        true
    }

    /// 玩家下线，保存角色数据后移出在线表
    pub async fn on_user_logout(&self, session: &Session) {
        let Some(user_id) = session.user_id else {
            return;
        };

        let mut users = self.users.lock().await;
        let Some(mut user) = users.on_user_logout(user_id, &session.session_id) else {
            tracing::debug!("ignoring logout of stale session {} for user {}", session.session_id, user_id);
            return;
        };
        user.on_logout();
        self.save_user(&user).await;

        tracing::info!("user {} left hall, online: {}", user_id, users.get_user_count());
    }

    async fn load_user_data(&self, user_id: PlayerId) -> Option<HallUserData> {
        match self.user_data.get_user_data(USER_DATA_ROLE, user_id).await {
            Ok(Some(json)) => Some(serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::error!("corrupt role data of user {}: {}", user_id, e);
                HallUserData::default()
            })),
            Ok(None) => None,
            Err(e) => {
                tracing::error!("failed to load role data of user {}: {}", user_id, e);
                None
            }
        }
    }

    async fn save_user(&self, user: &HallUser) {
        let user_id = user.user_data.user_id;
        let data = match user.get_user_save_data() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("failed to serialize role data of user {}: {}", user_id, e);
                return;
            }
        };
        if let Err(e) = self.user_data.cache_user_data(USER_DATA_ROLE, user_id, &data).await {
            tracing::error!("failed to save role data of user {}: {}", user_id, e);
        }
    }

    /// 通知旧会话所在网关关闭连接
    async fn close_session(&self, user_id: PlayerId, evicted: &Session) {
        tracing::info!("user {} logged in again, closing session {}", user_id, evicted.session_id);
        let msg = RpcMessage::new(None, json!({ "session_id": evicted.session_id }));
        if let Err(e) = self
            .bus
            .call_nr(&evicted.gate_server_id, msg_type::RPC_CLOSE_SESSION, msg)
            .await
        {
            tracing::warn!("failed to close session {}: {}", evicted.session_id, e);
        }
    }

    pub async fn online_count(&self) -> usize {
        self.users.lock().await.get_user_count()
    }

    /// 玩家当前绑定的会话
    pub async fn bound_session(&self, user_id: PlayerId) -> Option<String> {
        self.users
            .lock()
            .await
            .get_user(user_id)
            .map(|user| user.session.session_id.clone())
    }

    pub async fn user_data(&self, user_id: PlayerId) -> Option<HallUserData> {
        self.users
            .lock()
            .await
            .get_user(user_id)
            .map(|user| user.user_data.clone())
    }
}

#[async_trait]
impl RpcHandler for HallService {
    async fn handle(&self, handler: &str, msg: RpcMessage) -> Result<Value, RpcError> {
        match handler {
            msg_type::RPC_USER_LOGIN_SUCCESS => {
                let req: LoginSuccessRequest = msg.payload_as()?;
                let session = msg.require_session()?.clone();
                Ok(Value::Bool(self.on_user_login_success(session, &req.name).await))
            }
            msg_type::RPC_USER_LOGOUT => {
                self.on_user_logout(msg.require_session()?).await;
                Ok(Value::Null)
            }
            other => Err(RpcError::UnknownHandler(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::cache::keys::user_data_key;
    use crate::define::{EMPTY_USER_DATA, ServerType};
    use crate::rpc::LocalBus;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct GateStub {
        closed: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl RpcHandler for GateStub {
        async fn handle(&self, handler: &str, msg: RpcMessage) -> Result<Value, RpcError> {
            if handler == msg_type::RPC_CLOSE_SESSION {
                let id = msg.payload["session_id"].as_str().unwrap_or_default().to_string();
                let _ = self.closed.send(id);
            }
            Ok(Value::Bool(true))
        }
    }

    struct Fixture {
        hall: HallService,
        cache: Arc<MemoryCache>,
        closed: mpsc::UnboundedReceiver<String>,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(MemoryCache::new());
        let bus = Arc::new(LocalBus::new());
        let (tx, closed) = mpsc::unbounded_channel();
        bus.register("Gate@1", ServerType::Gate, Arc::new(GateStub { closed: tx }));
        Fixture {
            hall: HallService::new(cache.clone(), bus),
            cache,
            closed,
        }
    }

    fn session_for(user_id: PlayerId) -> Session {
        let mut session = Session::new("Gate@1", None);
        session.bind(user_id);
        session
    }

    async fn role_data(cache: &MemoryCache, user_id: PlayerId) -> Option<HallUserData> {
        let json = cache.get(&user_data_key(USER_DATA_ROLE, user_id)).await.unwrap()?;
        Some(serde_json::from_str(&json).unwrap())
    }

    async fn seed(cache: &MemoryCache, user_id: PlayerId, data: &str) {
        cache
            .set(&user_data_key(USER_DATA_ROLE, user_id), data)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_login_success_creates_profile_for_new_user() {
        let f = fixture();
        let user = PlayerId(1001);
        seed(&f.cache, user, EMPTY_USER_DATA).await;

        assert!(f.hall.on_user_login_success(session_for(user), "alice").await);

        let saved = role_data(&f.cache, user).await.unwrap();
        assert_eq!(saved.user_id, user);
        assert_eq!(saved.name, "alice");
        assert!(saved.is_registered());
        assert!(saved.last_login_time > 0);
        assert_eq!(f.hall.online_count().await, 1);
    }

    #[tokio::test]
    async fn test_login_success_without_loaded_data_fails() {
        let f = fixture();
        let user = PlayerId(1001);

        assert!(!f.hall.on_user_login_success(session_for(user), "alice").await);
        assert_eq!(f.hall.online_count().await, 0);
        assert!(role_data(&f.cache, user).await.is_none());
    }

    #[tokio::test]
    async fn test_login_success_keeps_registered_profile() {
        let f = fixture();
        let user = PlayerId(7);
        let mut existing = HallUserData::new(user, "bob");
        existing.money = 300;
        existing.level = 4;
        seed(&f.cache, user, &serde_json::to_string(&existing).unwrap()).await;

        assert!(f.hall.on_user_login_success(session_for(user), "renamed").await);

        let current = f.hall.user_data(user).await.unwrap();
        assert_eq!(current.name, "bob");
        assert_eq!(current.money, 300);
        assert_eq!(current.register_time, existing.register_time);
    }

    #[tokio::test]
    async fn test_login_success_corrupt_profile_starts_fresh() {
        let f = fixture();
        let user = PlayerId(9);
        seed(&f.cache, user, "{broken").await;

        assert!(f.hall.on_user_login_success(session_for(user), "carol").await);
        assert_eq!(role_data(&f.cache, user).await.unwrap().name, "carol");
    }

    #[tokio::test]
    async fn test_login_success_takeover_closes_old_session() {
        let mut f = fixture();
        let user = PlayerId(1001);
        seed(&f.cache, user, EMPTY_USER_DATA).await;
        let old = session_for(user);
        let new = session_for(user);

        f.hall.on_user_login_success(old.clone(), "alice").await;
        f.hall.on_user_login_success(new.clone(), "alice").await;

        let closed = tokio::time::timeout(Duration::from_secs(1), f.closed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed, old.session_id);
        assert_eq!(f.hall.online_count().await, 1);
        assert_eq!(f.hall.bound_session(user).await, Some(new.session_id.clone()));

        // 旧会话的下线消息不影响新会话
        f.hall.on_user_logout(&old).await;
        assert_eq!(f.hall.bound_session(user).await, Some(new.session_id));
    }

    #[tokio::test]
    async fn test_logout_saves_profile_and_removes_user() {
        let f = fixture();
        let user = PlayerId(1001);
        seed(&f.cache, user, EMPTY_USER_DATA).await;
        let session = session_for(user);
        f.hall.on_user_login_success(session.clone(), "alice").await;

        f.hall.on_user_logout(&session).await;

        assert_eq!(f.hall.online_count().await, 0);
        let saved = role_data(&f.cache, user).await.unwrap();
        assert!(saved.last_logout_time > 0);
        assert_eq!(saved.name, "alice");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_leave_single_entry() {
        let f = fixture();
        let user = PlayerId(42);
        seed(&f.cache, user, EMPTY_USER_DATA).await;
        let hall = Arc::new(f.hall);

        let sessions: Vec<Session> = (0..16).map(|_| session_for(user)).collect();
        let tasks: Vec<_> = sessions
            .iter()
            .cloned()
            .map(|session| {
                let hall = hall.clone();
                tokio::spawn(async move { hall.on_user_login_success(session, "storm").await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(hall.online_count().await, 1);
        let bound = hall.bound_session(user).await.unwrap();
        assert!(sessions.iter().any(|s| s.session_id == bound));
    }
}
