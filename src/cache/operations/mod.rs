/// 缓存操作
/// 提供缓存操作的功能实现

// 账号缓存操作
pub mod account;

// 会话缓存操作
pub mod session;

// 玩家系统数据缓存操作
pub mod user_data;

// 重新导出常用操作
pub use account::AccountCacheOperations;
pub use session::SessionCacheOperations;
pub use user_data::UserDataCacheOperations;
