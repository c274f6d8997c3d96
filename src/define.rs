use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 版本号
pub const VERSION: &str = "1.0.0.1";

/// 角色数据表名
pub const USER_DATA_ROLE: &str = "ROLE_DATA";

/// 新玩家的空数据占位
pub const EMPTY_USER_DATA: &str = "{}";

/// 玩家ID，全局唯一，分配后不再改变
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 服务器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServerType {
    Gate,
    Login,
    DBSvr,
    Hall,
}

impl ServerType {
    pub const ALL: [ServerType; 4] = [
        ServerType::Gate,
        ServerType::Login,
        ServerType::DBSvr,
        ServerType::Hall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::Gate => "Gate",
            ServerType::Login => "Login",
            ServerType::DBSvr => "DBSvr",
            ServerType::Hall => "Hall",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// 服务器实例ID，例如 `Hall@1`
pub type ServerId = String;

/// 消息名
pub mod msg_type {
    /// 客户端请求用户登录
    pub const CS_USER_LOGIN: &str = "userLogin";
    /// 用户下线
    pub const RPC_USER_LOGOUT: &str = "userLogout";
    /// 从db加载用户数据
    pub const RPC_LOAD_USER_INFO_FROM_DB: &str = "loadUserInfo";
    /// 用户登录成功
    pub const RPC_USER_LOGIN_SUCCESS: &str = "userLoginSuccess";
    /// 网关绑定会话玩家ID
    pub const RPC_BIND_SESSION: &str = "bindSession";
    /// 同步会话路由信息到网关
    pub const RPC_PUSH_SESSION: &str = "pushSession";
    /// 网关关闭会话
    pub const RPC_CLOSE_SESSION: &str = "closeSession";
}
