use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use game_backend::{
    AppState,
    cache::{KeyValueCache, RedisCache},
    config::Config,
    database::{DurableStore, UserDataOperation},
    define::VERSION,
    router,
    server::Cluster,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Starting game backend {}", VERSION);

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'game_backend';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await?;

    // 设置 Redis 客户端，启动前确认可用
    let redis_client = Arc::new(redis::Client::open(config.redis_url.clone())?);
    let redis_cache = RedisCache::new(redis_client, config.store_timeout());
    redis_cache.ping().await?;
    let cache: Arc<dyn KeyValueCache> = Arc::new(redis_cache);

    let store: Arc<dyn DurableStore> =
        Arc::new(UserDataOperation::new(Arc::new(pool), config.store_timeout()));

    let cluster = Cluster::start(&config, cache, store);
    // 每个数据系统一张表
    cluster.dbsvr.manager().create_tables().await?;

    let state = AppState {
        config: config.clone(),
        gate: cluster.gate.clone(),
    };

    let router = Router::new().merge(router::gate_routes());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let flushed = cluster.shutdown().await;
    tracing::info!("Server stopped, {} pending users flushed", flushed);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
