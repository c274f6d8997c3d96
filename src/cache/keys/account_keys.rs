/// 账号缓存键前缀
const ACCOUNT_PREFIX: &str = "Account:";

/// 玩家ID自增计数器键
pub const USER_ID_AUTO_INCR_KEY: &str = "USER_ID_AUTO_INCR_KEY";

/// 生成账号缓存键
pub fn account_key(account: &str) -> String {
    format!("{}{}", ACCOUNT_PREFIX, account)
}
