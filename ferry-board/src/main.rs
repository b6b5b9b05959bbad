use std::sync::Arc;

use chrono::Local;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use ferry_board::config::AppConfig;
use ferry_board::controller::{BoardController, TimerGroup};
use ferry_board::offline::{
    CacheCoordinator, CoordinatorConfig, DiskStorage, HttpFetcher, HttpFetcherConfig,
    MemoryStorage, StorageBackend,
};
use ferry_board::web::{AppState, create_router};

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ferry_board=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    let fetcher_config = HttpFetcherConfig::new().with_timeout(config.http_timeout.as_secs());
    let fetcher = HttpFetcher::new(fetcher_config).expect("Failed to create HTTP client");

    let storage = match &config.cache_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using disk cache");
            StorageBackend::Disk(DiskStorage::new(dir))
        }
        None => {
            info!("using in-memory cache");
            StorageBackend::Memory(MemoryStorage::new())
        }
    };

    // The server activates its coordinator immediately after installing
    let coordinator = Arc::new(CacheCoordinator::new(
        fetcher,
        storage,
        CoordinatorConfig::new(&config.upstream_url).with_manifest_path(&config.manifest_path),
    ));
    coordinator.install().await;
    coordinator.activate().await;

    let controller = Arc::new(
        BoardController::new(Arc::clone(&coordinator), config.lines.clone())
            .with_max_departures(config.max_departures),
    );
    controller.refresh_data(Local::now().naive_local()).await;

    let timers = TimerGroup::start(Arc::clone(&controller), config.intervals);
    let state = AppState::new(controller, timers, Arc::new(AppConfig::from_env));
    let app = create_router(state);

    info!(
        addr = %config.bind,
        upstream = %config.upstream_url,
        version = coordinator.version(),
        "ferry board listening"
    );

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server error");
}
