use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, routes};

// 网关相关的路由
pub fn gate_routes() -> Router<AppState> {
    Router::new()
        .route("/gate/connect", post(routes::gate::connect))
        .route("/gate/route", post(routes::gate::route))
        .route("/gate/disconnect", post(routes::gate::disconnect))
        .route("/gate/session/{user_id}", get(routes::gate::query_session))
}
