use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Path, State},
};
use serde_json::Value;

use super::model::{ConnectResponse, DisconnectResponse, RouteRequest, SessionRequest};
use crate::{
    AppState,
    define::PlayerId,
    error::AppError,
    gate::{RouteError, RouteOutcome, Session},
    result::ApiResult,
    utils::{error_codes, error_to_api_response, success_to_api_response},
};

// 建立会话
pub async fn connect(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Json<ApiResult<ConnectResponse>> {
    let session = state.gate.on_connect(Some(addr.to_string()));
    success_to_api_response(ConnectResponse {
        session_id: session.session_id,
    })
}

// 转发客户端消息，不带 msgId 的消息不等待回复
pub async fn route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<ApiResult<Value>>, AppError> {
    let outcome = state
        .gate
        .route_inbound(&req.session_id, &req.topic, req.payload)
        .await
        .map_err(|e| match e {
            RouteError::SessionNotFound(_) => AppError::SessionNotFound,
            RouteError::InvalidTopic(topic) | RouteError::UnknownService(topic) => {
                AppError::InvalidTopic(topic)
            }
            RouteError::Rpc(e) => {
                tracing::warn!("route {} failed: {}", req.topic, e);
                AppError::RouteFailed(e.to_string())
            }
        })?;

    Ok(match outcome {
        RouteOutcome::Forwarded => success_to_api_response(Value::Null),
        RouteOutcome::Reply(reply) => success_to_api_response(reply),
    })
}

// 断开会话
pub async fn disconnect(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<ApiResult<DisconnectResponse>>, AppError> {
    let session = state
        .gate
        .on_disconnect(&req.session_id)
        .await
        .ok_or(AppError::SessionNotFound)?;

    Ok(success_to_api_response(DisconnectResponse {
        session_id: session.session_id,
        user_id: session.user_id,
    }))
}

// 查询玩家最近一次下线的会话记录
pub async fn query_session(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<ApiResult<Session>> {
    match state.gate.query_session(PlayerId(user_id)).await {
        Some(session) => success_to_api_response(session),
        None => error_to_api_response(error_codes::NOT_FOUND, "没有会话记录"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Config;
    use crate::database::MemoryStore;
    use crate::server::Cluster;
    use std::sync::Arc;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            redis_url: String::new(),
            server_host: "127.0.0.1".into(),
            server_port: 0,
            session_grace_secs: 600,
            flush_delay_ms: 1000,
            user_data_systems: vec!["ROLE_DATA".into()],
            db_max_connections: 1,
            store_timeout_secs: 5,
            password_hash_cost: 4,
        }
    }

    fn state() -> AppState {
        let config = config();
        let cluster = Cluster::start(
            &config,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryStore::new()),
        );
        AppState {
            config,
            gate: cluster.gate,
        }
    }

    fn addr() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    #[tokio::test]
    async fn test_connect_then_disconnect() {
        let state = state();
        let Json(connected) = connect(State(state.clone()), addr()).await;
        let session_id = connected.content.unwrap().session_id;
        assert_eq!(state.gate.session_count(), 1);

        let Json(closed) = disconnect(
            State(state.clone()),
            Json(SessionRequest {
                session_id: session_id.clone(),
            }),
        )
        .await
        .unwrap();
        let closed = closed.content.unwrap();
        assert_eq!(closed.session_id, session_id);
        assert_eq!(closed.user_id, None);

        assert!(
            disconnect(State(state), Json(SessionRequest { session_id }))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_route_unknown_session_is_not_found() {
        let state = state();
        let req = RouteRequest {
            session_id: "missing".into(),
            topic: "Login/userLogin/1".into(),
            payload: Value::Null,
        };
        assert!(matches!(
            route(State(state), Json(req)).await,
            Err(AppError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_query_session_absent_returns_not_found_code() {
        let state = state();
        let Json(result) = query_session(State(state), Path(42)).await;
        assert_eq!(result.code, error_codes::NOT_FOUND);
        assert!(result.content.is_none());
    }
}
