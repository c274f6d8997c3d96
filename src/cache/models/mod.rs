/// 缓存数据模型
/// 定义缓存数据的结构体

// 账号缓存模型
pub mod account;

pub use account::CachedAccount;
