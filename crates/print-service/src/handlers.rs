//! API handlers for the Print Service

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use print_common::{
    HealthResponse, Job, OutputFormat, PrintJobResponse, PrintRequest, PrintRole,
    PrintersResponse, QueueStatus, QueuesResponse, RoleConfigUpdate,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    config::StoreProfile,
    dispatch::{Dispatcher, PrinterDirectory},
    error::ServiceError,
    queue::QueueManager,
    render::{DocumentModel, DocumentRenderer},
    roles::RoleStore,
};

/// Shared application state
pub struct AppState {
    pub queue: QueueManager,
    pub renderer: DocumentRenderer,
    pub dispatcher: Arc<Dispatcher>,
    pub printers: Arc<dyn PrinterDirectory>,
    pub roles: RoleStore,
    pub store: StoreProfile,
    /// Origins allowed by the CORS layer; `*` allows any
    pub allowed_origins: Vec<String>,
    pub started_at: Instant,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", err),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Rendered output waiting for its turn on the printer
enum Artifact {
    Thermal(Vec<u8>),
    Pdf(PathBuf),
}

/// Health check
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime: state.started_at.elapsed().as_secs(),
        service: "print-service".to_string(),
    })
}

/// OS printers plus the current role mapping
pub async fn list_printers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PrintersResponse>, ApiError> {
    let printers = match state.printers.list_printers().await {
        Ok(printers) => printers,
        Err(e) => {
            warn!("Printer enumeration failed: {}", e);
            Vec::new()
        }
    };
    let default_printer = printers
        .iter()
        .find(|p| p.is_default)
        .map(|p| p.name.clone());
    let config = state.roles.load().await.map_err(ServiceError::RoleConfig)?;

    Ok(Json(PrintersResponse {
        printers,
        default_printer,
        config,
    }))
}

/// Point a role at a printer
pub async fn update_config_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RoleConfigUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let role: PrintRole = payload.role.parse().map_err(ServiceError::from)?;
    let printer_name = payload.printer_name.trim();

    if printer_name.is_empty() {
        return Err(ServiceError::from(print_common::Error::Validation(
            "printerName is required".to_string(),
        ))
        .into());
    }
    if !state.printers.is_available(printer_name).await {
        return Err(ServiceError::PrinterUnavailable(printer_name.to_string()).into());
    }

    let config = state
        .roles
        .update(role, printer_name)
        .await
        .map_err(ServiceError::RoleConfig)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "config": config
    })))
}

pub async fn print_receipt_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrintRequest>,
) -> Result<Json<PrintJobResponse>, ApiError> {
    submit_print(&state, PrintRole::Receipt, payload).await
}

pub async fn print_invoice_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrintRequest>,
) -> Result<Json<PrintJobResponse>, ApiError> {
    submit_print(&state, PrintRole::Invoice, payload).await
}

pub async fn print_service_note_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrintRequest>,
) -> Result<Json<PrintJobResponse>, ApiError> {
    submit_print(&state, PrintRole::ServiceNote, payload).await
}

pub async fn print_custom_note_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrintRequest>,
) -> Result<Json<PrintJobResponse>, ApiError> {
    submit_print(&state, PrintRole::CustomNote, payload).await
}

/// Validate, resolve the printer, render, then queue the dispatch.
///
/// Everything that can be rejected is rejected before the job exists.
async fn submit_print(
    state: &AppState,
    role: PrintRole,
    mut request: PrintRequest,
) -> Result<Json<PrintJobResponse>, ApiError> {
    request.role = role;
    request.validate().map_err(ServiceError::from)?;

    let printer = state
        .roles
        .resolve(role)
        .await
        .map_err(ServiceError::RoleConfig)?
        .ok_or(ServiceError::RoleNotMapped(role))?;

    if !state.printers.is_available(&printer).await {
        return Err(ServiceError::PrinterUnavailable(printer).into());
    }

    let model = DocumentModel::build(&request, &state.store, Local::now());
    let format = match role {
        PrintRole::Receipt => request.format,
        _ => OutputFormat::Pdf,
    };
    let copies = request.copies();

    info!(
        "Rendering {} ({:?}, {} items) for {}",
        role,
        format,
        model.items.len(),
        printer
    );

    let artifact = match format {
        OutputFormat::Raw => Artifact::Thermal(state.renderer.render_thermal(&model)),
        OutputFormat::Pdf => Artifact::Pdf(
            state
                .renderer
                .render_pdf(&model)
                .await
                .map_err(ServiceError::from)?,
        ),
    };

    let metadata = serde_json::json!({
        "role": role,
        "format": format,
        "copies": copies,
        "items": model.items.len(),
        "invoiceNumber": model.invoice_number,
    });

    let dispatcher = state.dispatcher.clone();
    let target = printer.clone();
    let job_id = state
        .queue
        .submit(&printer, metadata, move || async move {
            let outcome = match artifact {
                Artifact::Thermal(bytes) => dispatcher.print_raw(&target, &bytes, copies).await?,
                Artifact::Pdf(path) => dispatcher.print_pdf(&target, path, copies).await?,
            };
            Ok::<_, anyhow::Error>(serde_json::to_value(outcome)?)
        })
        .await;

    let queue_status = state.queue.queue_status(&printer).await;

    Ok(Json(PrintJobResponse {
        success: true,
        job_id,
        printer,
        invoice_number: model.invoice_number,
        queue_status,
    }))
}

/// Get print job status
pub async fn get_job_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    match state.queue.get_job_status(&job_id).await {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("Job not found: {}", job_id),
        }),
    }
}

/// Status of every printer queue
pub async fn all_queues_handler(State(state): State<Arc<AppState>>) -> Json<QueuesResponse> {
    Json(QueuesResponse {
        queues: state.queue.all_queue_statuses().await,
    })
}

/// Status of one printer queue
pub async fn printer_queue_handler(
    State(state): State<Arc<AppState>>,
    Path(printer_name): Path<String>,
) -> Json<QueueStatus> {
    Json(state.queue.queue_status(&printer_name).await)
}
