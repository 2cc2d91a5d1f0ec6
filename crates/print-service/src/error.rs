//! Errors surfaced synchronously by the HTTP front door

use axum::http::StatusCode;
use print_common::PrintRole;
use thiserror::Error;

use crate::render::RenderError;

/// Failure to accept a print request
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Request(#[from] print_common::Error),

    #[error("no printer configured for role '{0}'")]
    RoleNotMapped(PrintRole),

    #[error("printer '{0}' is not available")]
    PrinterUnavailable(String),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("role configuration: {0:#}")]
    RoleConfig(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Request(err) => match err {
                print_common::Error::Validation(_)
                | print_common::Error::UnknownRole(_)
                | print_common::Error::JsonSerialization(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::RoleNotMapped(_) | ServiceError::PrinterUnavailable(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Render(RenderError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Render(_) | ServiceError::RoleConfig(_) | ServiceError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
