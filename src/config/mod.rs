use std::env;
use std::time::Duration;

use crate::define::USER_DATA_ROLE;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// 下线后会话记录保留时长
    pub session_grace_secs: u64,
    /// 下线后延迟落库时长
    pub flush_delay_ms: u64,
    /// 需要落库的玩家数据系统名（即表名）
    pub user_data_systems: Vec<String>,
    pub db_max_connections: u32,
    /// 单次缓存/数据库操作超时
    pub store_timeout_secs: u64,
    pub password_hash_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let user_data_systems = env::var("USER_DATA_SYSTEMS")
            .map(|v| parse_system_names(&v))
            .unwrap_or_else(|_| vec![USER_DATA_ROLE.to_string()]);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", 3000),
            session_grace_secs: parse_or("SESSION_GRACE_SECS", 600),
            flush_delay_ms: parse_or("FLUSH_DELAY_MS", 1000),
            user_data_systems,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            store_timeout_secs: parse_or("STORE_TIMEOUT_SECS", 5),
            password_hash_cost: parse_or("PASSWORD_HASH_COST", bcrypt::DEFAULT_COST),
        })
    }

    pub fn session_grace(&self) -> Duration {
        Duration::from_secs(self.session_grace_secs)
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 解析逗号分隔的系统名，忽略空白和空项
fn parse_system_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_system_names_skips_blanks() {
        assert_eq!(
            parse_system_names(" ROLE_DATA, ,BAG_DATA ,"),
            vec!["ROLE_DATA".to_string(), "BAG_DATA".to_string()]
        );
    }
}
