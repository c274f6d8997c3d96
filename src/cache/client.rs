use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use crate::error::StoreError;

/// 键值缓存接口
///
/// 进程启动时创建一次，以 `Arc<dyn KeyValueCache>` 注入各服务。
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 写入且不设置过期时间（会清除已有的过期时间）
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// 仅当键不存在时写入，返回是否写入成功
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// 设置过期时间，键不存在时返回 false
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// 剩余过期时间，键不存在或未设置过期时返回 None
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// 自增并返回新值
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;
}

/// 基于 Redis 的缓存实现
pub struct RedisCache {
    redis: Arc<RedisClient>,
    timeout: Duration,
}

impl RedisCache {
    pub fn new(redis: Arc<RedisClient>, timeout: Duration) -> Self {
        Self { redis, timeout }
    }

    /// 启动检查，连不上 Redis 时直接返回错误
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.with_timeout("redis PING", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn with_timeout<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(op))?
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_timeout("redis GET", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_timeout("redis SET", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            let _: () = conn.set(key, value).await?;
            Ok(())
        })
        .await
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.with_timeout("redis SETNX", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            let written: bool = conn.set_nx(key, value).await?;
            Ok(written)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.with_timeout("redis EXPIRE", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            let updated: bool = conn.expire(key, ttl.as_secs() as i64).await?;
            Ok(updated)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.with_timeout("redis TTL", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            // -2 键不存在，-1 未设置过期
            let secs: i64 = conn.ttl(key).await?;
            Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
        })
        .await
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.with_timeout("redis DEL", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            let removed: i64 = conn.del(key).await?;
            Ok(removed > 0)
        })
        .await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.with_timeout("redis INCR", async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            let value: i64 = conn.incr(key, 1).await?;
            Ok(value)
        })
        .await
    }
}
