//! 进程内持久化存储，供单机调试和测试使用。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::store::DurableStore;
use crate::define::PlayerId;
use crate::error::StoreError;

#[derive(Default)]
struct Tables {
    created: HashSet<String>,
    rows: HashMap<(String, PlayerId), Vec<u8>>,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    available: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    /// 模拟数据库不可达
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 直接读取一行，不计入读取次数
    pub fn row(&self, system_name: &str, user_id: PlayerId) -> Option<Vec<u8>> {
        self.tables
            .lock()
            .rows
            .get(&(system_name.to_string(), user_id))
            .cloned()
    }

    /// 直接写入一行，用于准备数据
    pub fn insert_row(&self, system_name: &str, user_id: PlayerId, data: &[u8]) {
        let mut tables = self.tables.lock();
        tables.created.insert(system_name.to_string());
        tables
            .rows
            .insert((system_name.to_string(), user_id), data.to_vec());
    }

    pub fn has_table(&self, system_name: &str) -> bool {
        self.tables.lock().created.contains(system_name)
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn create_table(&self, system_name: &str) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().created.insert(system_name.to_string());
        Ok(())
    }

    async fn load_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.row(system_name, user_id))
    }

    async fn save_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.check()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.insert_row(system_name, user_id, data);
        Ok(())
    }
}
