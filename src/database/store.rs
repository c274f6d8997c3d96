use async_trait::async_trait;

use crate::define::PlayerId;
use crate::error::StoreError;

/// 持久化存储接口
///
/// 每个系统名对应一张表，每个玩家一行，数据对存储层不透明。
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// 建表（幂等）
    async fn create_table(&self, system_name: &str) -> Result<(), StoreError>;

    /// 读取玩家数据，没有记录时返回 None
    async fn load_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// 写入玩家数据，已存在则覆盖
    async fn save_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
        data: &[u8],
    ) -> Result<(), StoreError>;
}
