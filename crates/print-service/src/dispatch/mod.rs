//! Printer Dispatcher
//!
//! Hands rendered artifacts to the operating system. Each mode has an ordered
//! fallback chain; tiers run in order until one succeeds and the winning tier
//! is reported back so it lands in the job result.

pub mod command;
pub mod pdf;
pub mod raw;
pub mod system;

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifacts::{self, ArtifactStore};
use crate::config::Config;

pub use command::{CommandStrategy, CommandTemplate};
pub use system::{PrinterDirectory, SystemPrinters};

/// One way of getting a file onto a printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchTier {
    /// Bytes copied straight to the device port
    PortCopy,
    /// Raw job through the OS spooler
    Spooler,
    /// Plain-text job painted by the OS print path
    DrawingSurface,
    /// External PDF print utility
    PrintUtility,
    /// Installed viewer's silent print mode
    DocumentViewer,
    /// Headless browser printing the file
    HeadlessBrowser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Raw,
    Pdf,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub printer: &'a str,
    pub file: &'a Path,
    pub copies: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAttempt {
    pub tier: DispatchTier,
    pub error: String,
}

/// What reached the printer and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub mode: DispatchMode,
    pub tier: DispatchTier,
    pub printer: String,
    pub copies: u32,
    /// Tiers tried before the one that succeeded
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_attempts: Vec<FailedAttempt>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid command template '{0}'")]
    InvalidCommand(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    CommandTimedOut { program: String, timeout: Duration },

    #[error("{0:?} is not supported on this host")]
    Unsupported(DispatchTier),

    #[error("no dispatch tier succeeded{}", describe_attempts(.0))]
    Exhausted(Vec<FailedAttempt>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_attempts(attempts: &[FailedAttempt]) -> String {
    if attempts.is_empty() {
        return " (no tier available)".to_string();
    }
    let parts: Vec<String> = attempts
        .iter()
        .map(|a| format!("{:?}: {}", a.tier, a.error))
        .collect();
    format!(": {}", parts.join("; "))
}

#[async_trait]
pub trait DispatchStrategy: Send + Sync {
    fn tier(&self) -> DispatchTier;

    /// Whether this tier can run for `printer` on this host
    fn is_supported(&self, _printer: &str) -> bool {
        true
    }

    async fn send(&self, request: &DispatchRequest<'_>) -> Result<(), DispatchError>;
}

/// Ordered strategies for one mode
pub struct FallbackChain {
    mode: DispatchMode,
    strategies: Vec<Arc<dyn DispatchStrategy>>,
}

impl FallbackChain {
    pub fn new(mode: DispatchMode, strategies: Vec<Arc<dyn DispatchStrategy>>) -> Self {
        Self { mode, strategies }
    }

    pub fn tiers(&self) -> Vec<DispatchTier> {
        self.strategies.iter().map(|s| s.tier()).collect()
    }

    pub async fn dispatch(
        &self,
        request: &DispatchRequest<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut failed_attempts = Vec::new();

        for strategy in &self.strategies {
            let tier = strategy.tier();
            if !strategy.is_supported(request.printer) {
                debug!("Skipping {:?} for {}: not available", tier, request.printer);
                continue;
            }

            match strategy.send(request).await {
                Ok(()) => {
                    info!("Sent to {} via {:?}", request.printer, tier);
                    return Ok(DispatchOutcome {
                        mode: self.mode,
                        tier,
                        printer: request.printer.to_string(),
                        copies: request.copies,
                        failed_attempts,
                    });
                }
                Err(e) => {
                    warn!("{:?} failed for {}: {}", tier, request.printer, e);
                    failed_attempts.push(FailedAttempt {
                        tier,
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(DispatchError::Exhausted(failed_attempts))
    }
}

/// Raw and PDF chains plus artifact cleanup
pub struct Dispatcher {
    raw: FallbackChain,
    pdf: FallbackChain,
    artifacts: ArtifactStore,
    cleanup_delay: Duration,
}

impl Dispatcher {
    pub fn new(
        raw: Vec<Arc<dyn DispatchStrategy>>,
        pdf: Vec<Arc<dyn DispatchStrategy>>,
        artifacts: ArtifactStore,
        cleanup_delay: Duration,
    ) -> Self {
        Self {
            raw: FallbackChain::new(DispatchMode::Raw, raw),
            pdf: FallbackChain::new(DispatchMode::Pdf, pdf),
            artifacts,
            cleanup_delay,
        }
    }

    /// Chains for this host, built from configuration
    pub fn from_config(config: &Config, artifacts: ArtifactStore) -> Self {
        Self::new(
            raw::raw_chain(&config.raw_ports),
            pdf::pdf_chain(&config.pdf_commands),
            artifacts,
            config.cleanup_delay,
        )
    }

    pub fn raw_tiers(&self) -> Vec<DispatchTier> {
        self.raw.tiers()
    }

    pub fn pdf_tiers(&self) -> Vec<DispatchTier> {
        self.pdf.tiers()
    }

    /// Spool a thermal byte stream
    pub async fn print_raw(
        &self,
        printer: &str,
        bytes: &[u8],
        copies: u32,
    ) -> Result<DispatchOutcome, DispatchError> {
        let payload = bytes.repeat(copies.max(1) as usize);
        let path = self.artifacts.write(payload, ".bin").await?;
        let request = DispatchRequest {
            printer,
            file: &path,
            copies: 1,
        };
        let result = self.raw.dispatch(&request).await;
        self.release(path, result.is_ok()).await;
        result.map(|outcome| DispatchOutcome { copies, ..outcome })
    }

    /// Spool a rendered PDF; takes ownership of the artifact
    pub async fn print_pdf(
        &self,
        printer: &str,
        path: PathBuf,
        copies: u32,
    ) -> Result<DispatchOutcome, DispatchError> {
        let request = DispatchRequest {
            printer,
            file: &path,
            copies: copies.max(1),
        };
        let result = self.pdf.dispatch(&request).await;
        self.release(path, result.is_ok()).await;
        result
    }

    /// Delayed delete after a spool, immediate delete after a failure
    async fn release(&self, path: PathBuf, dispatched: bool) {
        if dispatched {
            self.artifacts.schedule_cleanup(path, self.cleanup_delay);
        } else {
            artifacts::remove_now(&path).await;
        }
    }
}
