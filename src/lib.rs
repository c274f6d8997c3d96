use config::Config;
use std::sync::Arc;

use gate::GateManager;

pub mod cache;
pub mod config;
pub mod database;
pub mod dbsvr;
pub mod define;
pub mod error;
pub mod gate;
pub mod hall;
pub mod login;
pub mod result;
pub mod router;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gate: Arc<GateManager>,
}
