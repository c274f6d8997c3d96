use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use crate::cache::{KeyValueCache, UserDataCacheOperations};
use crate::database::DurableStore;
use crate::define::{EMPTY_USER_DATA, PlayerId};
use crate::error::StoreError;
use crate::utils::now_timestamp;

enum PendingState {
    /// 等待延迟结束，发送即取消
    Scheduled(oneshot::Sender<()>),
    /// 正在写回，写完后变为 true
    Flushing(watch::Receiver<bool>),
}

/// 下线待写回标记
struct PendingLogout {
    logout_at: i64,
    generation: u64,
    state: PendingState,
}

/// 玩家数据在缓存与数据库之间的搬运
///
/// 在线期间缓存是唯一可写的副本；下线后等待 `flush_delay`，
/// 期间重新登录则取消写回，缓存数据继续使用。
pub struct DbManager {
    user_data: UserDataCacheOperations,
    store: Arc<dyn DurableStore>,
    systems: Vec<String>,
    flush_delay: Duration,
    pending: Mutex<HashMap<PlayerId, PendingLogout>>,
    generation: AtomicU64,
    /// 登录时因数据库无记录（或记录损坏）写入缓存的空数据
    seeded: Mutex<HashSet<(PlayerId, String)>>,
}

impl DbManager {
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        store: Arc<dyn DurableStore>,
        systems: Vec<String>,
        flush_delay: Duration,
    ) -> Self {
        Self {
            user_data: UserDataCacheOperations::new(cache),
            store,
            systems,
            flush_delay,
            pending: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            seeded: Mutex::new(HashSet::new()),
        }
    }

    /// 为每个系统建表，启动时调用
    pub async fn create_tables(&self) -> Result<(), StoreError> {
        for system in &self.systems {
            self.store.create_table(system).await?;
        }
        Ok(())
    }

    /// 玩家登录，确保每个系统的数据都在缓存中
    ///
    /// 所有系统的缓存访问都失败时返回错误；数据库读取失败只记录日志。
    pub async fn on_user_login(&self, user_id: PlayerId) -> Result<bool, StoreError> {
        self.cancel_pending(user_id).await;

        let mut failed = 0;
        let mut last_error = None;
        for system in &self.systems {
            if let Err(e) = self.load_system(system, user_id).await {
                tracing::error!("failed to load {} of user {}: {}", system, user_id, e);
                failed += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if failed == self.systems.len() => Err(e),
            _ => Ok(true),
        }
    }

    /// 去掉下线标记，已在写回的等它写完
    async fn cancel_pending(&self, user_id: PlayerId) {
        let marker = self.pending.lock().remove(&user_id);
        let Some(marker) = marker else {
            return;
        };

        match marker.state {
            PendingState::Scheduled(cancel) => {
                let _ = cancel.send(());
                tracing::debug!("cancelled pending flush of user {}", user_id);
            }
            PendingState::Flushing(mut done) => {
                tracing::info!("user {} logged in during flush, waiting", user_id);
                let _ = done.wait_for(|done| *done).await;
            }
        }
    }

    async fn load_system(&self, system: &str, user_id: PlayerId) -> Result<(), StoreError> {
        if self.user_data.get_user_data(system, user_id).await?.is_some() {
            return Ok(());
        }

        // 无记录或记录损坏时为 None，缓存空数据
        let loaded = match self.store.load_user_data(system, user_id).await {
            Ok(Some(bytes)) => String::from_utf8(bytes)
                .map_err(|e| tracing::error!("corrupt {} of user {}: {}", system, user_id, e))
                .ok(),
            Ok(None) => None,
            Err(StoreError::Decompress(e)) => {
                tracing::error!("corrupt {} of user {}: {}", system, user_id, e);
                None
            }
            Err(e) => {
                tracing::error!("failed to read {} of user {} from database: {}", system, user_id, e);
                return Ok(());
            }
        };

        let seed = (user_id, system.to_string());
        match loaded {
            Some(data) => {
                self.seeded.lock().remove(&seed);
                self.user_data.cache_user_data(system, user_id, &data).await
            }
            None => {
                self.user_data
                    .cache_user_data(system, user_id, EMPTY_USER_DATA)
                    .await?;
                self.seeded.lock().insert(seed);
                Ok(())
            }
        }
    }

    /// 玩家下线，延迟写回
    pub fn on_user_logout(self: &Arc<Self>, user_id: PlayerId) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            if let Some(PendingLogout {
                state: PendingState::Flushing(_),
                ..
            }) = pending.get(&user_id)
            {
                tracing::debug!("user {} is already being flushed", user_id);
                return;
            }
            // 旧的取消句柄随旧标记一起丢弃，旧任务随之退出
            pending.insert(
                user_id,
                PendingLogout {
                    logout_at: now_timestamp(),
                    generation,
                    state: PendingState::Scheduled(cancel_tx),
                },
            );
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.delayed_flush(user_id, generation, cancel_rx).await;
        });
    }

    async fn delayed_flush(&self, user_id: PlayerId, generation: u64, cancel: oneshot::Receiver<()>) {
        tokio::select! {
            _ = tokio::time::sleep(self.flush_delay) => {}
            _ = cancel => {
                tracing::debug!("flush of user {} cancelled", user_id);
                return;
            }
        }

        let (done_tx, done_rx) = watch::channel(false);
        {
            let mut pending = self.pending.lock();
            match pending.get_mut(&user_id) {
                Some(marker) if marker.generation == generation => {
                    marker.state = PendingState::Flushing(done_rx);
                }
                _ => return,
            }
        }

        self.save_user_data(user_id).await;
        done_tx.send_replace(true);

        let mut pending = self.pending.lock();
        if pending.get(&user_id).is_some_and(|marker| marker.generation == generation) {
            pending.remove(&user_id);
        }
    }

    /// 把缓存中的数据写回数据库，成功后删除缓存
    ///
    /// 写入失败的数据保留在缓存中。登录时补上的空数据如果没有被修改，不写数据库。
    async fn save_user_data(&self, user_id: PlayerId) {
        for system in &self.systems {
            let seed = (user_id, system.clone());
            let data = match self.user_data.get_user_data(system, user_id).await {
                Ok(Some(data)) => data,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("failed to read {} of user {} from cache: {}", system, user_id, e);
                    continue;
                }
            };

            let untouched = data == EMPTY_USER_DATA && self.seeded.lock().contains(&seed);
            if !untouched {
                if let Err(e) = self.store.save_user_data(system, user_id, data.as_bytes()).await {
                    tracing::error!("failed to save {} of user {}, kept in cache: {}", system, user_id, e);
                    continue;
                }
            }

            self.seeded.lock().remove(&seed);
            if let Err(e) = self.user_data.remove_user_data(system, user_id).await {
                tracing::warn!("failed to evict {} of user {}: {}", system, user_id, e);
            }
        }
        tracing::info!("user {} data flushed", user_id);
    }

    /// 立即写回，不等待延迟
    pub async fn flush_now(&self, user_id: PlayerId) {
        self.cancel_pending(user_id).await;
        self.save_user_data(user_id).await;
    }

    /// 写回所有待写回的玩家，停服时调用
    pub async fn flush_pending(&self) -> usize {
        let user_ids: Vec<PlayerId> = self.pending.lock().keys().copied().collect();
        for user_id in &user_ids {
            self.flush_now(*user_id).await;
        }
        tracing::info!("flushed {} pending users", user_ids.len());
        user_ids.len()
    }

    /// 下线时间，没有待写回时返回 None
    pub fn pending_logout_at(&self, user_id: PlayerId) -> Option<i64> {
        self.pending.lock().get(&user_id).map(|marker| marker.logout_at)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
