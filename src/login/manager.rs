use std::sync::Arc;

use crate::cache::{AccountCacheOperations, CachedAccount, KeyValueCache};
use crate::define::PlayerId;
use crate::error::{LoginError, StoreError};
use crate::utils::{hash_password, now_timestamp, verify_password};

/// 账号管理
///
/// 账号第一次登录时自动注册。账号记录只在缓存中，写入时使用 SET NX，
/// 并发注册同一账号时只有一个玩家ID生效。
pub struct LoginManager {
    accounts: AccountCacheOperations,
    hash_cost: u32,
}

impl LoginManager {
    pub fn new(cache: Arc<dyn KeyValueCache>, hash_cost: u32) -> Self {
        Self {
            accounts: AccountCacheOperations::new(cache),
            hash_cost,
        }
    }

    /// 验证账号密码，返回玩家ID；密码错误或记录损坏返回 None
    pub async fn authenticate(
        &self,
        account: &str,
        password: &str,
    ) -> Result<Option<PlayerId>, LoginError> {
        if account.is_empty() || password.is_empty() {
            return Ok(None);
        }

        match self.accounts.get_account(account).await {
            Ok(Some(existing)) => return self.check_password(&existing, password).await,
            Ok(None) => {}
            Err(StoreError::Serialization(e)) => {
                tracing::error!("corrupt account record {}: {}", account, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        self.register(account, password).await
    }

    async fn register(&self, account: &str, password: &str) -> Result<Option<PlayerId>, LoginError> {
        let user_id = self.accounts.next_user_id().await?;

        let plain = password.to_string();
        let cost = self.hash_cost;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain, cost)).await??;

        let record = CachedAccount {
            user_id,
            account: account.to_string(),
            password_hash,
            created_at: now_timestamp(),
        };
        if self.accounts.create_account(&record).await? {
            tracing::info!("account {} registered as user {}", account, user_id);
            return Ok(Some(user_id));
        }

        // 并发注册时以先写入的记录为准，本次分配的ID作废
        tracing::warn!(
            "account {} was registered concurrently, discarding user id {}",
            account,
            user_id
        );
        match self.accounts.get_account(account).await? {
            Some(winner) => self.check_password(&winner, password).await,
            None => Ok(None),
        }
    }

    async fn check_password(
        &self,
        record: &CachedAccount,
        password: &str,
    ) -> Result<Option<PlayerId>, LoginError> {
        let password = password.to_string();
        let hash = record.password_hash.clone();
        let matched = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
        Ok(matched.then_some(record.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::cache::keys::account_key;

    fn manager() -> (LoginManager, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        (LoginManager::new(cache.clone(), 4), cache)
    }

    #[tokio::test]
    async fn test_authenticate_new_account_allocates_id() {
        let (manager, cache) = manager();

        let user_id = manager.authenticate("alice", "pw1").await.unwrap();
        assert_eq!(user_id, Some(PlayerId(1)));

        let stored = cache.get(&account_key("alice")).await.unwrap().unwrap();
        let record: CachedAccount = serde_json::from_str(&stored).unwrap();
        assert_eq!(record.user_id, PlayerId(1));
        assert_ne!(record.password_hash, "pw1");
    }

    #[tokio::test]
    async fn test_authenticate_existing_account_returns_same_id() {
        let (manager, _) = manager();
        let first = manager.authenticate("alice", "pw1").await.unwrap();
        manager.authenticate("bob", "pw").await.unwrap();

        assert_eq!(manager.authenticate("alice", "pw1").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password_fails() {
        let (manager, _) = manager();
        manager.authenticate("alice", "pw1").await.unwrap();

        assert_eq!(manager.authenticate("alice", "wrong").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_authenticate_empty_credentials_fail() {
        let (manager, cache) = manager();
        assert_eq!(manager.authenticate("", "pw").await.unwrap(), None);
        assert_eq!(manager.authenticate("alice", "").await.unwrap(), None);
        assert_eq!(cache.get(&account_key("alice")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_authenticate_corrupt_record_fails() {
        let (manager, cache) = manager();
        cache.set(&account_key("alice"), "not json").await.unwrap();

        assert_eq!(manager.authenticate("alice", "pw1").await.unwrap(), None);
        // 损坏的记录不会被覆盖
        assert_eq!(
            cache.get(&account_key("alice")).await.unwrap().as_deref(),
            Some("not json")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_authenticate_concurrent_first_login_single_id() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);

        let a = tokio::spawn({
            let manager = manager.clone();
            async move { manager.authenticate("carol", "pw").await.unwrap() }
        });
        let b = tokio::spawn({
            let manager = manager.clone();
            async move { manager.authenticate("carol", "pw").await.unwrap() }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(manager.authenticate("carol", "pw").await.unwrap(), a);
    }

    #[tokio::test]
    async fn test_authenticate_cache_offline_is_error() {
        let (manager, cache) = manager();
        cache.set_available(false);

        assert!(matches!(
            manager.authenticate("alice", "pw1").await,
            Err(LoginError::Store(StoreError::Unavailable(_)))
        ));
    }
}
