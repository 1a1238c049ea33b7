use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use guildhub_core::cache::{CacheEngine, CacheLoader};
use guildhub_core::config::Config;
use guildhub_core::env_config::log_config;
use guildhub_core::logging::init_logging;
use guildhub_core::scheduler::{ScheduledTask, Scheduler, SchedulerCallback};
use guildhub_core::state::AppState;
use guildhub_core::store::{CircuitBreakerConfig, GatewayConfig, StoreGateway};
use guildhub_core::translation::Bundle;

/// Periodic sweep of expired cache entries and overdue preload candidates
/// (§4.A maintenance loop, SUPPLEMENTED FEATURES item 4: 60s cadence).
/// Self-contained in store + cache, so it is the one scheduled callback
/// this bootstrap can wire up without a chat-platform gateway adapter.
struct CacheMaintenance {
    cache: Arc<CacheEngine>,
    loader: Arc<CacheLoader>,
}

#[async_trait]
impl ScheduledTask for CacheMaintenance {
    async fn run(&self) {
        let evicted = self.cache.cleanup_expired();
        if evicted > 0 {
            tracing::debug!(evicted, "cache maintenance: swept expired entries");
        }
        for (key, category, predicted) in self.cache.preload_candidates() {
            let cache = self.cache.clone();
            let loader = self.loader.clone();
            tokio::spawn(async move {
                cache.run_preload(key, category, predicted, loader.as_ref()).await;
            });
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env()?);

    let log_dir = PathBuf::from("logs");
    let _log_guard = init_logging(&log_dir, config.production);
    log_config(&config);

    tracing::info!("connecting to store...");
    let gateway_config = GatewayConfig {
        database_url: format!(
            "postgres://{}@{}:{}/{}",
            config.db_user, config.db_host, config.db_port, config.db_name
        ),
        pool_size: config.db_pool_size,
        acquire_timeout: Duration::from_secs(u64::from(config.db_timeout_secs)),
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: config.db_circuit_breaker_threshold,
            ..CircuitBreakerConfig::default()
        },
        slow_query_threshold: Duration::from_secs(1),
    };
    let store = Arc::new(StoreGateway::connect(gateway_config).await?);
    store.run_migrations().await?;

    let cache = Arc::new(CacheEngine::new());
    let loader = Arc::new(CacheLoader::new(cache.clone(), store.clone()));
    tracing::info!("hydrating cache from store...");
    loader.load_all().await;

    let translations = Arc::new(match &config.translation_file {
        Some(path) => Bundle::load(path, guildhub_core::translation::MAX_TRANSLATION_FILE_BYTES).await?,
        None => Bundle::default(),
    });

    let mut scheduler = Scheduler::new();
    scheduler.register(
        SchedulerCallback::CacheMaintenance,
        Duration::from_secs(60),
        Arc::new(CacheMaintenance { cache: cache.clone(), loader: loader.clone() }),
    );
    let scheduler = Arc::new(scheduler);

    // `close`, `remind`, `delete`, `roster_maintenance` and
    // `create_daily_events` drive Discord-facing side effects through the
    // `platform` traits; this crate defines those traits but not a
    // concrete adapter, so the embedding bot process registers them
    // against `state.scheduler` once it has a live gateway.
    let _state = AppState::new(config, store, cache, loader, translations, scheduler.clone());

    tracing::info!("guildhub-core bootstrap complete, entering scheduler loop");
    let scheduler_handle = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    scheduler_handle.abort();

    Ok(())
}
