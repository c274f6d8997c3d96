//! 单进程部署：四类服务各起一个实例，挂在同一条进程内总线上。

use std::sync::Arc;

use crate::cache::KeyValueCache;
use crate::config::Config;
use crate::database::DurableStore;
use crate::dbsvr::{DbManager, DbSvrService};
use crate::define::{ServerId, ServerType};
use crate::gate::GateManager;
use crate::hall::HallService;
use crate::login::{LoginManager, LoginService};
use crate::rpc::LocalBus;

/// 实例ID，形如 `Hall@1`
pub fn server_id(kind: ServerType, index: u32) -> ServerId {
    format!("{}@{}", kind, index)
}

pub struct Cluster {
    pub bus: Arc<LocalBus>,
    pub gate: Arc<GateManager>,
    pub login: Arc<LoginService>,
    pub dbsvr: Arc<DbSvrService>,
    pub hall: Arc<HallService>,
}

impl Cluster {
    /// 创建并注册所有服务，需要在 tokio 运行时中调用
    pub fn start(config: &Config, cache: Arc<dyn KeyValueCache>, store: Arc<dyn DurableStore>) -> Self {
        let bus = Arc::new(LocalBus::new());

        let gate = Arc::new(GateManager::new(
            server_id(ServerType::Gate, 1),
            cache.clone(),
            bus.clone(),
            config.session_grace(),
        ));
        let login = Arc::new(LoginService::new(
            LoginManager::new(cache.clone(), config.password_hash_cost),
            bus.clone(),
        ));
        let dbsvr = Arc::new(DbSvrService::new(Arc::new(DbManager::new(
            cache.clone(),
            store,
            config.user_data_systems.clone(),
            config.flush_delay(),
        ))));
        let hall = Arc::new(HallService::new(cache, bus.clone()));

        bus.register(gate.server_id().to_string(), ServerType::Gate, gate.clone());
        bus.register(server_id(ServerType::Login, 1), ServerType::Login, login.clone());
        bus.register(server_id(ServerType::DBSvr, 1), ServerType::DBSvr, dbsvr.clone());
        bus.register(server_id(ServerType::Hall, 1), ServerType::Hall, hall.clone());

        tracing::info!("cluster started with {} user data systems", config.user_data_systems.len());
        Self {
            bus,
            gate,
            login,
            dbsvr,
            hall,
        }
    }

    /// 停服前把所有待写回的玩家数据写入数据库
    pub async fn shutdown(&self) -> usize {
        self.dbsvr.manager().flush_pending().await
    }
}
