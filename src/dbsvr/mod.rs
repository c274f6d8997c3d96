// 数据服模块
// 登录时把玩家数据从数据库加载进缓存，下线后延迟写回数据库并清理缓存

pub mod manager;
pub mod service;

pub use manager::DbManager;
pub use service::DbSvrService;
