use chrono::NaiveDate;
use sqlx::FromRow;

/// 玩家系统数据表实体
#[derive(Debug, FromRow)]
pub struct UserDataEntity {
    pub id: i64,
    /// lz4 压缩后的数据
    pub data: Option<Vec<u8>>,
    pub submission_date: Option<NaiveDate>,
}
