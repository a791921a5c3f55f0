use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slidesmith_db::{GenerationStore, PgStore};
use slidesmith_events::{EventBus, EventLogger};
use slidesmith_pipeline::{BlobStorage, JobContext, LocalBlobStorage, TaskOrchestrator};
use slidesmith_provider::ProviderCache;
use slidesmith_worker::{PendingTaskDispatcher, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "slidesmith_worker=debug,slidesmith_pipeline=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        task_workers = config.pipeline.task_workers,
        storage_root = %config.pipeline.storage_root.display(),
        text_model = %config.text_model,
        image_model = %config.image_model,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = slidesmith_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    slidesmith_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    slidesmith_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store: Arc<dyn GenerationStore> = Arc::new(PgStore::new(pool.clone()));

    // --- Providers and storage ---
    let providers = ProviderCache::new(config.provider.clone());
    let text = providers.get(&config.text_model).await;
    let images = providers.get(&config.image_model).await;

    tokio::fs::create_dir_all(&config.pipeline.storage_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create storage root {}",
                config.pipeline.storage_root.display()
            )
        })?;
    let storage: Arc<dyn BlobStorage> =
        Arc::new(LocalBlobStorage::new(config.pipeline.storage_root.clone()));

    // --- Event bus ---
    let events = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(EventLogger::run(events.subscribe()));

    // --- Orchestrator ---
    let ctx = Arc::new(JobContext::new(
        config.pipeline.clone(),
        Arc::clone(&store),
        storage,
        images,
        text,
        Arc::clone(&events),
    ));
    let orchestrator = TaskOrchestrator::new(ctx);

    let dispatcher = PendingTaskDispatcher::new(
        Arc::clone(&store),
        orchestrator.clone(),
        config.poll_interval,
        config.dispatch_batch,
    );
    let cancel = tokio_util::sync::CancellationToken::new();
    let dispatcher_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };

    shutdown_signal().await;
    tracing::info!("Shutdown requested, draining in-flight tasks");

    cancel.cancel();
    let _ = dispatcher_handle.await;
    orchestrator.shutdown().await;

    // Dropping the last bus handles closes the channel and stops the logger.
    drop(orchestrator);
    drop(events);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
