//! HTTP client for the local print service

use print_common::{
    HealthResponse, Job, PrintJobResponse, PrintRequest, PrintRole, PrintersResponse,
    QueuesResponse, RoleConfigUpdate,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default address of the daemon on the till
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3001";

#[derive(Error, Debug)]
pub enum ClientError {
    /// The service could not be reached or the body could not be read
    #[error("print service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status
    #[error("print service returned {status}: {message}")]
    Service { status: u16, message: String },
}

impl ClientError {
    /// Whether the failure says anything about the service being down
    pub fn is_unreachable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout(),
            ClientError::Service { status, .. } => *status == 502 || *status == 503,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the print service API
#[derive(Debug, Clone)]
pub struct PrintServiceClient {
    base_url: String,
    client: reqwest::Client,
}

/// Endpoint serving `role`
pub fn print_endpoint(role: PrintRole) -> &'static str {
    match role {
        PrintRole::Receipt => "/print/receipt",
        PrintRole::Invoice => "/print/invoice",
        PrintRole::ServiceNote => "/print/nota-servis",
        PrintRole::CustomNote => "/print/nota-custom",
    }
}

impl PrintServiceClient {
    /// Create a client; `timeout` bounds every request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health_check(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        parse(response).await
    }

    /// Submit a document; returns as soon as the job is queued
    pub async fn print(
        &self,
        role: PrintRole,
        request: &PrintRequest,
    ) -> Result<PrintJobResponse, ClientError> {
        let url = format!("{}{}", self.base_url, print_endpoint(role));

        debug!("Submitting {} to {}", role, url);

        let response = self.client.post(&url).json(request).send().await?;
        parse(response).await
    }

    /// Job status, or `None` once the job is unknown or expired
    pub async fn job_status(&self, job_id: &str) -> Result<Option<Job>, ClientError> {
        let url = format!("{}/job/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        parse(response).await.map(Some)
    }

    pub async fn printers(&self) -> Result<PrintersResponse, ClientError> {
        let url = format!("{}/printers", self.base_url);
        let response = self.client.get(&url).send().await?;
        parse(response).await
    }

    pub async fn queues(&self) -> Result<QueuesResponse, ClientError> {
        let url = format!("{}/queue/status", self.base_url);
        let response = self.client.get(&url).send().await?;
        parse(response).await
    }

    /// Point `role` at `printer_name`
    pub async fn set_role_printer(
        &self,
        role: PrintRole,
        printer_name: &str,
    ) -> Result<(), ClientError> {
        let url = format!("{}/printers/config", self.base_url);
        let body = RoleConfigUpdate {
            role: role.as_str().to_string(),
            printer_name: printer_name.to_string(),
        };
        let response = self.client.post(&url).json(&body).send().await?;
        parse::<serde_json::Value>(response).await.map(|_| ())
    }
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| {
                if text.is_empty() {
                    status.to_string()
                } else {
                    text
                }
            });
        return Err(ClientError::Service {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}
