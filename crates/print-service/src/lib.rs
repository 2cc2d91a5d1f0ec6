//! Print Service
//!
//! Local print daemon for the store's web app. Print requests are validated,
//! rendered to ESC/POS bytes or PDF, and queued per physical printer; callers
//! poll job status instead of waiting for the printer.

pub mod artifacts;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod render;
pub mod roles;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use artifacts::ArtifactStore;
pub use config::Config;
pub use dispatch::{Dispatcher, PrinterDirectory, SystemPrinters};
pub use error::ServiceError;
pub use handlers::AppState;
pub use queue::QueueManager;
pub use render::{ChromeEngine, DocumentRenderer, PdfRenderer, RenderEngine, Templates, ThermalLayout};
pub use roles::RoleStore;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/printers", get(handlers::list_printers_handler))
        .route("/printers/config", post(handlers::update_config_handler))
        .route("/print/receipt", post(handlers::print_receipt_handler))
        .route("/print/invoice", post(handlers::print_invoice_handler))
        .route("/print/nota-servis", post(handlers::print_service_note_handler))
        .route("/print/nota-custom", post(handlers::print_custom_note_handler))
        .route("/job/{job_id}", get(handlers::get_job_handler))
        .route("/queue/status", get(handlers::all_queues_handler))
        .route("/queue/{printer_name}", get(handlers::printer_queue_handler))
        .with_state(shared_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The hosted app and local dev servers call from other origins, and the
/// browser asks for private-network access before reaching a local address.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_private_network(true);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
