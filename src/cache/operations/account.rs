use std::sync::Arc;

use crate::cache::client::KeyValueCache;
use crate::cache::keys::{USER_ID_AUTO_INCR_KEY, account_key};
use crate::cache::models::account::CachedAccount;
use crate::define::PlayerId;
use crate::error::StoreError;

/// 账号缓存操作
#[derive(Clone)]
pub struct AccountCacheOperations {
    cache: Arc<dyn KeyValueCache>,
}

impl AccountCacheOperations {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// 获取账号，记录损坏时返回反序列化错误
    pub async fn get_account(&self, account: &str) -> Result<Option<CachedAccount>, StoreError> {
        let json = self.cache.get(&account_key(account)).await?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 写入新账号，账号已存在时不覆盖并返回 false
    pub async fn create_account(&self, account: &CachedAccount) -> Result<bool, StoreError> {
        let json = serde_json::to_string(account)?;
        self.cache.set_nx(&account_key(&account.account), &json).await
    }

    /// 分配新的玩家ID
    pub async fn next_user_id(&self) -> Result<PlayerId, StoreError> {
        let id = self.cache.incr(USER_ID_AUTO_INCR_KEY).await?;
        Ok(PlayerId(id))
    }
}
