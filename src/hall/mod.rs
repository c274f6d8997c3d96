// 大厅模块
// 维护在线玩家表，保证每个玩家最多只有一个在线会话

pub mod service;
pub mod user;
pub mod user_data;
pub mod user_manager;

pub use service::HallService;
pub use user::HallUser;
pub use user_data::HallUserData;
pub use user_manager::HallUserManager;
