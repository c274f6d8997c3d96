use std::sync::Arc;

use crate::cache::client::KeyValueCache;
use crate::cache::keys::user_data_key;
use crate::define::PlayerId;
use crate::error::StoreError;

/// 玩家系统数据缓存操作
///
/// 数据按原样存取，不关心具体格式。
#[derive(Clone)]
pub struct UserDataCacheOperations {
    cache: Arc<dyn KeyValueCache>,
}

impl UserDataCacheOperations {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    pub async fn get_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
    ) -> Result<Option<String>, StoreError> {
        self.cache.get(&user_data_key(system_name, user_id)).await
    }

    pub async fn cache_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
        data: &str,
    ) -> Result<(), StoreError> {
        self.cache.set(&user_data_key(system_name, user_id), data).await
    }

    pub async fn remove_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
    ) -> Result<bool, StoreError> {
        self.cache.del(&user_data_key(system_name, user_id)).await
    }
}
