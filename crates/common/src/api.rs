//! Request and response bodies of the print service HTTP API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::job::QueueStatus;
use crate::request::PrintRole;

/// Role → physical printer name
pub type RoleMap = BTreeMap<PrintRole, String>;

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    /// Seconds since the service started
    pub uptime: u64,

    #[serde(default)]
    pub service: String,
}

/// Returned by every `POST /print/*` endpoint once the job is queued
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJobResponse {
    pub success: bool,

    /// Job ID for status polling
    #[serde(rename = "jobID")]
    pub job_id: String,

    /// Printer the job was queued on
    pub printer: String,

    /// Invoice number used on the document (invoices only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    /// Queue snapshot right after submission
    pub queue_status: QueueStatus,
}

/// A printer known to the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterInfo {
    pub name: String,

    pub is_default: bool,

    /// Human-readable state reported by the spooler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// `GET /printers`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintersResponse {
    pub printers: Vec<PrinterInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_printer: Option<String>,

    /// Current role mapping
    pub config: RoleMap,
}

/// `POST /printers/config`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfigUpdate {
    /// Role name, e.g. `receipt` or `invoice`
    #[serde(rename = "type")]
    pub role: String,

    pub printer_name: String,
}

/// `GET /queue/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuesResponse {
    pub queues: Vec<QueueStatus>,
}
