use std::sync::Arc;
use std::time::Duration;

use crate::cache::client::KeyValueCache;
use crate::cache::keys::session_key;
use crate::define::PlayerId;
use crate::error::StoreError;
use crate::gate::Session;

/// 会话缓存操作
#[derive(Clone)]
pub struct SessionCacheOperations {
    cache: Arc<dyn KeyValueCache>,
}

impl SessionCacheOperations {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// 缓存会话，不设置过期时间
    pub async fn cache_session(&self, user_id: PlayerId, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;
        self.cache.set(&session_key(user_id), &json).await
    }

    /// 设置会话过期时间
    pub async fn expire_session(&self, user_id: PlayerId, ttl: Duration) -> Result<bool, StoreError> {
        self.cache.expire(&session_key(user_id), ttl).await
    }

    /// 获取会话，记录损坏时返回反序列化错误
    pub async fn get_session(&self, user_id: PlayerId) -> Result<Option<Session>, StoreError> {
        match self.cache.get(&session_key(user_id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
