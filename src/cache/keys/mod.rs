/// 缓存键模块
/// 提供各种缓存键生成函数，键格式由各服务共享

// 账号缓存键模块
pub mod account_keys;

// 玩家会话与数据缓存键模块
pub mod user_keys;

// 重新导出常用的键生成函数
pub use account_keys::{USER_ID_AUTO_INCR_KEY, account_key};
pub use user_keys::{session_key, user_data_key};
