// 缓存模块
// 包含缓存客户端、缓存键、缓存数据结构和操作逻辑

pub mod client;
pub mod keys;
pub mod memory;
pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use client::{KeyValueCache, RedisCache};
pub use memory::MemoryCache;
pub use models::CachedAccount;
pub use operations::{AccountCacheOperations, SessionCacheOperations, UserDataCacheOperations};
