use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bedwars_arena_server::config::ServerConfig;
use bedwars_arena_server::game::constants::store::DEFAULT_CHANNEL;
use bedwars_arena_server::lobby::effects::LogEffects;
use bedwars_arena_server::lobby::manager::{spawn_notice_handler, ArenaManager};
use bedwars_arena_server::metrics::{self, Metrics};
use bedwars_arena_server::net::coordinator::{Coordinator, SettingStatus};
use bedwars_arena_server::net::listener::MessageRouter;
use bedwars_arena_server::net::store::{MemoryStore, SharedStore};

/// Pick the shared store: Redis when configured, otherwise an in-process store
async fn open_store(config: &ServerConfig) -> Arc<dyn SharedStore> {
    #[cfg(feature = "redis")]
    {
        if let Some(redis) = &config.redis {
            match bedwars_arena_server::net::redis_store::RedisStore::connect(redis).await {
                Ok(store) => {
                    info!("Connected to shared store at {}:{}", redis.host, redis.port);
                    return Arc::new(store);
                }
                Err(e) => warn!("Shared store unreachable ({}), running standalone", e),
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    {
        if config.redis.is_some() {
            warn!("REDIS_HOST is set but the redis feature is disabled, running standalone");
        }
    }

    Arc::new(MemoryStore::new())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("BedWars Arena Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: server_id={}, arenas={}, max_arenas={}",
        config.server_id,
        config.arenas.len(),
        config.max_arenas
    );

    // Initialize metrics
    let metrics = Arc::new(Metrics::new());
    let cancel = CancellationToken::new();

    let metrics_server = {
        let metrics = metrics.clone();
        let cancel = cancel.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics, port, cancel).await {
                error!("Metrics server error: {}", e);
            }
        })
    };

    // Coordination layer
    let store = open_store(&config).await;
    let channel = config
        .redis
        .as_ref()
        .map_or_else(|| DEFAULT_CHANNEL.to_string(), |r| r.channel.clone());
    let coordinator = Arc::new(Coordinator::open(config.server_id.clone(), channel.clone(), store, metrics.clone()).await);

    match coordinator.check_setting("channel", &channel).await {
        SettingStatus::Mismatch { stored } => {
            warn!("This server uses channel '{}' but the fleet uses '{}'", channel, stored)
        }
        SettingStatus::Unavailable => warn!("Could not verify fleet settings"),
        SettingStatus::Stored | SettingStatus::Matches => {}
    }
    coordinator.connect(Arc::new(MessageRouter::new()));

    // Arenas
    let (manager, notices) = ArenaManager::new(&config, Some(coordinator.clone()), Arc::new(LogEffects), metrics.clone());
    let manager = Arc::new(RwLock::new(manager));
    let created = manager.write().await.create_initial_arenas().await?;
    info!("Server ready with {} arenas: {}", created.len(), created.join(", "));

    let notice_handler = spawn_notice_handler(manager.clone(), notices, cancel.child_token());

    // Shutdown signal handler
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
    info!("Shutting down...");

    // Cleanup
    cancel.cancel();
    if let Err(e) = notice_handler.await {
        error!("Notice handler ended abnormally: {}", e);
    }
    manager.write().await.shutdown_all().await;
    coordinator.close().await;
    if let Err(e) = metrics_server.await {
        error!("Metrics server ended abnormally: {}", e);
    }

    info!("Server stopped");
    Ok(())
}
