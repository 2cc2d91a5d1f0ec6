//! Client-side fallback between the print service and native printing
//!
//! The controller watches the service's health endpoint. Two failed checks
//! in a row mark the service offline; one good check brings it back. Print
//! calls made while offline skip the service entirely.

use print_common::{PrintRequest, PrintRole};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{ClientError, PrintServiceClient};
use crate::native::{NativeError, NativePrinter};

/// Consecutive failed health checks before the service counts as offline
pub const OFFLINE_AFTER_FAILURES: u32 = 2;

/// Which path printed the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintMethod {
    Service,
    Browser,
}

/// Result of a print call, whichever path handled it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOutcome {
    pub success: bool,
    pub method: PrintMethod,
    #[serde(rename = "jobID", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    /// Why the service was bypassed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Both paths failed
#[derive(Error, Debug)]
#[error("native print failed: {native}")]
pub struct FallbackError {
    #[source]
    pub native: NativeError,
    /// Service failure that triggered the fallback, if it was tried
    pub service: Option<ClientError>,
}

#[derive(Debug)]
struct Health {
    online: AtomicBool,
    failures: AtomicU32,
}

impl Health {
    fn record_success(&self) {
        self.failures.store(0, Ordering::SeqCst);
        if !self.online.swap(true, Ordering::SeqCst) {
            info!("Print service is back online");
        }
    }

    fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= OFFLINE_AFTER_FAILURES && self.online.swap(false, Ordering::SeqCst) {
            warn!(
                "Print service offline after {} failed checks; using native printing",
                failures
            );
        }
    }
}

/// Routes print calls to the service, or to native printing when it is down
#[derive(Clone)]
pub struct FallbackController {
    client: PrintServiceClient,
    native: Arc<dyn NativePrinter>,
    health: Arc<Health>,
}

impl FallbackController {
    /// The service is assumed online until checks say otherwise
    pub fn new(client: PrintServiceClient, native: Arc<dyn NativePrinter>) -> Self {
        Self {
            client,
            native,
            health: Arc::new(Health {
                online: AtomicBool::new(true),
                failures: AtomicU32::new(0),
            }),
        }
    }

    pub fn client(&self) -> &PrintServiceClient {
        &self.client
    }

    pub fn is_online(&self) -> bool {
        self.health.online.load(Ordering::SeqCst)
    }

    /// Probe the health endpoint once and update the online state
    pub async fn check_health(&self) -> bool {
        match self.client.health_check().await {
            Ok(health) if health.status == "healthy" => {
                self.health.record_success();
                true
            }
            Ok(health) => {
                debug!("Print service reported {}", health.status);
                self.health.record_failure();
                false
            }
            Err(e) => {
                debug!("Health check failed: {}", e);
                self.health.record_failure();
                false
            }
        }
    }

    /// Check health every `interval` until the handle is aborted
    pub fn spawn_health_monitor(&self, interval: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                controller.check_health().await;
            }
        })
    }

    /// Print through the service, falling back to native printing when the
    /// service is offline or the call fails.
    pub async fn print(
        &self,
        role: PrintRole,
        request: &PrintRequest,
    ) -> Result<PrintOutcome, FallbackError> {
        if !self.is_online() {
            return self
                .print_native(role, request, "print service offline".to_string(), None)
                .await;
        }

        match self.client.print(role, request).await {
            Ok(response) => Ok(PrintOutcome {
                success: true,
                method: PrintMethod::Service,
                job_id: Some(response.job_id),
                printer: Some(response.printer),
                invoice_number: response.invoice_number,
                reason: None,
            }),
            Err(e) => {
                warn!("Print service call failed, falling back: {}", e);
                if e.is_unreachable() {
                    self.health.record_failure();
                }
                let reason = e.to_string();
                self.print_native(role, request, reason, Some(e)).await
            }
        }
    }

    async fn print_native(
        &self,
        role: PrintRole,
        request: &PrintRequest,
        reason: String,
        service: Option<ClientError>,
    ) -> Result<PrintOutcome, FallbackError> {
        info!("Printing {} natively ({})", role, reason);

        match self.native.print(role, request).await {
            Ok(()) => Ok(PrintOutcome {
                success: true,
                method: PrintMethod::Browser,
                job_id: None,
                printer: None,
                invoice_number: request.invoice_number.clone(),
                reason: Some(reason),
            }),
            Err(native) => Err(FallbackError { native, service }),
        }
    }
}
