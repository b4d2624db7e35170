//! Finova reward engine service binary

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use prometheus::Registry;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finova_common::SystemClock;
use finova_engine::{
    api::{self, AppState},
    EngineConfig, EngineSettings, LedgerEvent, RewardEngine,
};
use finova_ledger::{EventLedger, FileStore, LedgerStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finova_engine=info,finova_ledger=info".into()),
        )
        .init();

    info!("Starting Finova reward engine v{}", finova_common::VERSION);

    let config = EngineConfig::load()?;
    let policy = config.load_policy()?;
    info!(policy_version = policy.version, "Loaded configuration: {:?}", config);

    let store: Arc<dyn LedgerStore<LedgerEvent>> = match &config.ledger_path {
        Some(path) => {
            info!("Ledger file: {}", path.display());
            Arc::new(FileStore::open(path).await?)
        }
        None => {
            warn!("No ledger path configured, state will not survive a restart");
            Arc::new(MemoryStore::<LedgerEvent>::new())
        }
    };
    let ledger = Arc::new(EventLedger::open(store).await?);

    let settings = EngineSettings::new(policy).with_rate_limit(config.rate_limit.clone());
    let engine = Arc::new(RewardEngine::new(settings, Arc::new(SystemClock::new()), ledger)?);

    let registry = Arc::new(Registry::new());
    engine.metrics().register(&registry)?;

    // Background sweep: timeouts, expired cards, rate drift
    let sweeper = engine.clone();
    let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            sweeper.sweep().await;
        }
    });

    let app = api::router(AppState { engine, registry });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("REST API listening on {}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Shutting down Finova reward engine");
    Ok(())
}
