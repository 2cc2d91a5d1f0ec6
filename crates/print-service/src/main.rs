//! Print Service
//!
//! REST API for print jobs + per-printer queues draining in the background

use anyhow::{Context, Result};
use print_service::{
    create_router, AppState, ArtifactStore, ChromeEngine, Config, Dispatcher, DocumentRenderer,
    PdfRenderer, QueueManager, RenderEngine, RoleStore, SystemPrinters, Templates,
    ThermalLayout,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "print_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration (also loads .env)
    let config = Config::from_env().context("Failed to load configuration")?;
    config.ensure_directories()?;

    info!("Starting Print Service");
    info!("Role config: {}", config.role_config_path.display());
    info!("Artifact directory: {}", config.artifact_dir.display());
    info!("Allowed origins: {}", config.allowed_origins.join(", "));

    let artifacts = ArtifactStore::new(&config.artifact_dir);

    // Rendering engine: one instance for the whole process
    let engine = Arc::new(ChromeEngine::new(
        config.browser_path.clone(),
        config.artifact_dir.clone(),
        config.render_timeout,
    ));
    match engine.warm_up().await {
        Ok(()) => info!("Rendering engine ready"),
        Err(e) => {
            error!("Rendering engine unavailable: {}", e);
            error!("PDF documents will fail until a browser is installed; raw receipts still print");
        }
    }

    let renderer = DocumentRenderer::new(
        Templates::builtin().context("Failed to compile document templates")?,
        PdfRenderer::spawn(engine, artifacts.clone(), config.render_timeout),
        ThermalLayout {
            width: config.thermal_width,
            cut_feed_lines: config.cut_feed_lines,
        },
    );

    let dispatcher = Dispatcher::from_config(&config, artifacts.clone());
    info!("Raw dispatch tiers: {:?}", dispatcher.raw_tiers());
    info!("PDF dispatch tiers: {:?}", dispatcher.pdf_tiers());

    let queue = QueueManager::new(config.job_retention);

    // Background sweeps
    let job_sweep = queue.spawn_retention_sweep(config.sweep_interval);
    let artifact_sweep = artifacts.spawn_orphan_sweep(config.sweep_interval, config.orphan_max_age);

    // Create application state
    let state = AppState {
        queue,
        renderer,
        dispatcher: Arc::new(dispatcher),
        printers: Arc::new(SystemPrinters::new(config.raw_ports.clone())),
        roles: RoleStore::new(&config.role_config_path),
        store: config.store.clone(),
        allowed_origins: config.allowed_origins.clone(),
        started_at: Instant::now(),
    };

    // Create router
    let app = create_router(state);

    // Start API server
    let addr = config.api_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Print Service API running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    job_sweep.abort();
    artifact_sweep.abort();

    Ok(())
}
