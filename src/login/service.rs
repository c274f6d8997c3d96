use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::LoginManager;
use crate::define::{PlayerId, ServerType, msg_type};
use crate::gate::Session;
use crate::rpc::{RpcError, RpcHandler, RpcMessage, ServiceBus, ServiceProxy};
use crate::utils::error_codes;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub account: String,
    pub password: String,
}

/// 登录结果，失败时不区分具体原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub error_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<PlayerId>,
}

impl LoginResponse {
    pub fn success(user_id: PlayerId) -> Self {
        Self {
            error_code: error_codes::SUCCESS,
            user_id: Some(user_id),
        }
    }

    pub fn failed() -> Self {
        Self {
            error_code: error_codes::LOGIN_FAILED,
            user_id: None,
        }
    }
}

/// 登录服务
pub struct LoginService {
    manager: LoginManager,
    proxy: ServiceProxy,
}

impl LoginService {
    pub fn new(manager: LoginManager, bus: Arc<dyn ServiceBus>) -> Self {
        Self {
            manager,
            proxy: ServiceProxy::new(bus),
        }
    }

    /// 客户端登录
    ///
    /// 认证通过后依次：在网关绑定会话、等待数据服把玩家数据加载进缓存、
    /// 通知大厅登录成功。
    pub async fn user_login(&self, session: Session, req: LoginRequest) -> LoginResponse {
        if session.is_authenticated() {
            tracing::warn!("session {} is already logged in", session.session_id);
            return LoginResponse::failed();
        }

        let user_id = match self.manager.authenticate(&req.account, &req.password).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                tracing::info!("login rejected for account {}", req.account);
                return LoginResponse::failed();
            }
            Err(e) => {
                tracing::error!("failed to authenticate account {}: {}", req.account, e);
                return LoginResponse::failed();
            }
        };

        match self.complete_login(session, user_id, &req.account).await {
            Ok(()) => {
                tracing::info!("user {} logged in with account {}", user_id, req.account);
                LoginResponse::success(user_id)
            }
            Err(e) => {
                tracing::error!("failed to complete login of user {}: {}", user_id, e);
                LoginResponse::failed()
            }
        }
    }

    async fn complete_login(
        &self,
        session: Session,
        user_id: PlayerId,
        account: &str,
    ) -> Result<(), RpcError> {
        let bound = self
            .proxy
            .bus()
            .call(
                &session.gate_server_id,
                msg_type::RPC_BIND_SESSION,
                RpcMessage::new(
                    None,
                    json!({ "session_id": session.session_id, "user_id": user_id }),
                ),
            )
            .await?;
        let mut session: Session =
            serde_json::from_value(bound).map_err(|e| RpcError::BadPayload(e.to_string()))?;

        let loaded = self
            .proxy
            .call(
                &mut session,
                ServerType::DBSvr,
                msg_type::RPC_LOAD_USER_INFO_FROM_DB,
                json!({ "user_id": user_id }),
            )
            .await?;
        if loaded != Value::Bool(true) {
            return Err(RpcError::Handler(format!("user {} data not loaded", user_id)));
        }

        self.proxy
            .invoke_nr(
                &mut session,
                ServerType::Hall,
                msg_type::RPC_USER_LOGIN_SUCCESS,
                json!({ "name": account }),
            )
            .await
    }
}

#[async_trait]
impl RpcHandler for LoginService {
    async fn handle(&self, handler: &str, msg: RpcMessage) -> Result<Value, RpcError> {
        match handler {
            msg_type::CS_USER_LOGIN => {
                let req: LoginRequest = msg.payload_as()?;
                let session = msg.require_session()?.clone();
                let resp = self.user_login(session, req).await;
                serde_json::to_value(resp).map_err(|e| RpcError::Handler(e.to_string()))
            }
            // 登录服不保存在线状态
            msg_type::RPC_USER_LOGOUT => Ok(Value::Null),
            other => Err(RpcError::UnknownHandler(other.to_string())),
        }
    }
}
