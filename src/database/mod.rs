// 数据库模块
// 包含存储接口、数据库实体定义和存储操作实现

pub mod memory;
pub mod models; // 数据库实体定义
pub mod operations; // 数据库操作实现
pub mod store;

// 重新导出常用类型，方便其他模块使用
pub use memory::MemoryStore;
pub use operations::user_data::UserDataOperation;
pub use store::DurableStore;
