// 登录模块
// 账号认证、玩家ID分配，登录成功后通知数据服和大厅

pub mod manager;
pub mod service;

pub use manager::LoginManager;
pub use service::{LoginRequest, LoginResponse, LoginService};
