use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use skyward_api::{
    app,
    middleware::Resiliency,
    state::{flow_settings, AppState},
};
use skyward_core::SessionStore;
use skyward_flow::BookingFlow;
use skyward_store::app_config::SessionBackend;
use skyward_store::{Config, HttpBookingBackend, MemorySessionStore, RedisSessionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyward_api=debug,skyward_flow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Skyward API on port {}", config.server.port);

    let store: Arc<dyn SessionStore> = match config.session.store {
        SessionBackend::Redis => {
            let redis = RedisSessionStore::new(&config.redis.url, config.session.ttl_seconds)
                .await
                .context("Failed to open Redis client")?;
            if let Err(e) = redis.ping().await {
                tracing::warn!("Redis not reachable yet: {}", e);
            }
            Arc::new(redis)
        }
        SessionBackend::Memory => {
            tracing::warn!("Using in-memory sessions; flows will not survive a restart");
            let memory = Arc::new(MemorySessionStore::new(Duration::from_secs(config.session.ttl_seconds)));
            memory.spawn_sweeper(Duration::from_secs(config.session.sweep_interval_secs.max(1)));
            memory
        }
    };

    let backend = HttpBookingBackend::new(&config.backend).context("Failed to build backend client")?;
    tracing::info!("Booking backend at {}", config.backend.base_url);

    let app_state = AppState {
        flow: Arc::new(BookingFlow::new(
            Arc::new(backend),
            store,
            flow_settings(&config.polling),
        )),
        resiliency: Arc::new(Resiliency::new(&config.resiliency)),
    };

    let app = app(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
