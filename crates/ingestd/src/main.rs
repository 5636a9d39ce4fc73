mod metrics;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpix_core::{
    load_config, validate_config, ClassifyStage, ContentStore, FetchScheduler, FsStore,
    HttpClassifier, HttpValidator, Registry, SanitizedConfig, SqliteRegistry, StageAreas,
    StageCoordinator, ValidateStage,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("stockpix-ingestd {}", VERSION);

    // Determine config path
    let config_path = std::env::var("STOCKPIX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        config = %serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default(),
        "Configuration loaded"
    );

    // Touch the metrics registry so collection starts at zero from boot.
    let _ = &*metrics::REGISTRY;

    // Bootstrap directories: stage areas, store root, registry parent.
    let areas = StageAreas::new(&config.pipeline.data_root);
    areas
        .ensure()
        .await
        .context("Failed to create stage areas")?;
    tokio::fs::create_dir_all(&config.store.root)
        .await
        .context("Failed to create store root")?;
    if let Some(parent) = config.registry.path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create registry directory")?;
        }
    }

    // Create registry and content store
    let registry: Arc<dyn Registry> = Arc::new(
        SqliteRegistry::new(&config.registry.path, config.fetcher.max_attempts)
            .context("Failed to open registry")?,
    );
    info!("Registry initialized at {:?}", config.registry.path);

    let store: Arc<dyn ContentStore> = Arc::new(FsStore::new(&config.store.root));
    info!("Content store initialized at {:?}", config.store.root);

    // Create stage components
    let fetcher = FetchScheduler::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        config.fetcher.clone(),
    );

    let classifier = Arc::new(HttpClassifier::new(config.classifier.clone()));
    let classify = ClassifyStage::new(classifier, &config.classifier);
    info!("Classifier client initialized ({})", config.classifier.url);

    let validator = Arc::new(HttpValidator::new(config.validator.clone()));
    let validate = ValidateStage::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        validator,
        &config.validator,
    );
    info!("Validator client initialized ({})", config.validator.url);

    // Create and run the coordinator
    let coordinator = Arc::new(StageCoordinator::new(
        areas,
        fetcher,
        classify,
        validate,
        Duration::from_secs(config.pipeline.poll_interval_secs),
    ));

    {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            coordinator.stop();
        });
    }

    let run_result = coordinator.run().await;

    // Final run summary, whatever the exit path.
    if let Ok(stats) = registry.stats() {
        info!(
            total = stats.total,
            fetched = stats.fetched,
            fetch_failed = stats.fetch_failed,
            validated = stats.validated,
            validation_failed = stats.validation_failed,
            "Registry summary"
        );
    }
    for line in metrics::encode_metrics().lines() {
        if !line.starts_with('#') && !line.is_empty() {
            info!(metric = line, "Final counter");
        }
    }

    run_result.context("Pipeline run failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
