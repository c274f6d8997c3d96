// 玩家数据存储库
// 每个系统一张表，数据经 lz4 压缩后保存

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;

use crate::database::models::user_data::UserDataEntity;
use crate::database::store::DurableStore;
use crate::define::PlayerId;
use crate::error::StoreError;

/// 玩家数据存储库，处理所有与玩家系统数据相关的数据库操作
pub struct UserDataOperation {
    db: Arc<PgPool>,
    /// 已确认存在的表
    tables: RwLock<HashSet<String>>,
    timeout: Duration,
}

impl UserDataOperation {
    /// 创建新的玩家数据存储库实例
    pub fn new(db: Arc<PgPool>, timeout: Duration) -> Self {
        Self {
            db,
            tables: RwLock::new(HashSet::new()),
            timeout,
        }
    }

    /// 首次使用某个系统时建表
    async fn ensure_table(&self, system_name: &str) -> Result<(), StoreError> {
        if self.tables.read().contains(system_name) {
            return Ok(());
        }
        self.create_table(system_name).await
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
impl DurableStore for UserDataOperation {
    async fn create_table(&self, system_name: &str) -> Result<(), StoreError> {
        let table = validate_table_name(system_name)?;

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                id BIGINT PRIMARY KEY,
                data BYTEA,
                submission_date DATE
            )
            "#,
            table
        );

        self.with_timeout("create table", async {
            sqlx::query(&sql).execute(&*self.db).await?;
            Ok(())
        })
        .await?;

        self.tables.write().insert(table.to_string());
        tracing::info!("User data table ready: {}", table);
        Ok(())
    }

    async fn load_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_table(system_name).await?;

        let sql = format!(
            r#"SELECT id, data, submission_date FROM "{}" WHERE id = $1"#,
            system_name
        );

        let row = self
            .with_timeout("load user data", async {
                let row = sqlx::query_as::<_, UserDataEntity>(&sql)
                    .bind(user_id.0)
                    .fetch_optional(&*self.db)
                    .await?;
                Ok(row)
            })
            .await?;

        match row.and_then(|entity| entity.data) {
            Some(compressed) => {
                let data = decode_blob(&compressed)?;
                tracing::info!(
                    "userid:{} get {} from database, len={}",
                    user_id,
                    system_name,
                    data.len()
                );
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn save_user_data(
        &self,
        system_name: &str,
        user_id: PlayerId,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.ensure_table(system_name).await?;

        let sql = format!(
            r#"
            INSERT INTO "{}" (id, data, submission_date)
            VALUES ($1, $2, CURRENT_DATE)
            ON CONFLICT (id) DO UPDATE
            SET data = EXCLUDED.data, submission_date = EXCLUDED.submission_date
            "#,
            system_name
        );
        let compressed = encode_blob(data);

        self.with_timeout("save user data", async {
            sqlx::query(&sql)
                .bind(user_id.0)
                .bind(compressed)
                .execute(&*self.db)
                .await?;
            Ok(())
        })
        .await
    }
}

/// 表名直接拼进 SQL，只允许字母、数字和下划线
fn validate_table_name(name: &str) -> Result<&str, StoreError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(StoreError::InvalidTable(name.to_string()))
    }
}

fn encode_blob(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

fn decode_blob(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    Ok(lz4_flex::decompress_size_prepended(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name_rejects_injection() {
        assert!(validate_table_name("ROLE_DATA").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("ROLE_DATA\"; DROP TABLE x; --").is_err());
    }

    #[test]
    fn test_decode_blob_restores_compressed_data() {
        let raw = br#"{"UserID":1001,"Name":"alice","Level":3}"#;
        let stored = encode_blob(raw);
        assert_eq!(decode_blob(&stored).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_decode_blob_rejects_garbage() {
        assert!(matches!(
            decode_blob(&[4, 0, 0, 0, 0xff]),
            Err(StoreError::Decompress(_))
        ));
    }
}
