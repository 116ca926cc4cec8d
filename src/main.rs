use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use watermelon_analyzer::{
    config::{Config, StoreBackend},
    create_app,
    handlers::AppState,
    services::{
        redis::RedisService,
        usage_store::{MemoryUsageStore, RedisUsageStore, UsageStore},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watermelon_analyzer=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let store: Arc<dyn UsageStore> = match config.usage_store {
        StoreBackend::Redis => {
            let redis = RedisService::new(&config.redis_url).await?;
            tracing::info!("Connected to Redis");
            Arc::new(RedisUsageStore::new(redis))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory usage store; counters reset on restart");
            Arc::new(MemoryUsageStore::new())
        }
    };

    let port = config.port;
    let state = AppState::new(config, store)?;
    let app = create_app(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
