//! Persisted role → printer mapping
//!
//! The file is re-read on every lookup so an operator can repoint a role
//! without restarting the service. Writes go through a temp file and a rename.

use anyhow::{Context, Result};
use print_common::{PrintRole, RoleMap};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Printer used for receipts when nothing is configured
pub const DEFAULT_RECEIPT_PRINTER: &str = "POS-58";

/// Printer used for page documents when nothing is configured
pub const DEFAULT_PAGE_PRINTER: &str = "EPSON-L3110";

/// Mapping used before the first configuration update
pub fn default_roles() -> RoleMap {
    PrintRole::ALL
        .iter()
        .map(|role| {
            let printer = match role {
                PrintRole::Receipt => DEFAULT_RECEIPT_PRINTER,
                _ => DEFAULT_PAGE_PRINTER,
            };
            (*role, printer.to_string())
        })
        .collect()
}

pub struct RoleStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RoleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current mapping, with defaults filled in for roles the file omits
    pub async fn load(&self) -> Result<RoleMap> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(default_roles()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read role config: {}", self.path.display())
                })
            }
        };

        let stored: BTreeMap<String, String> = serde_json::from_slice(&contents)
            .with_context(|| format!("Invalid role config: {}", self.path.display()))?;

        let mut roles = default_roles();
        for (key, printer) in stored {
            match key.parse::<PrintRole>() {
                Ok(role) if !printer.trim().is_empty() => {
                    roles.insert(role, printer);
                }
                Ok(_) => {}
                Err(_) => warn!("Ignoring unknown role '{}' in {}", key, self.path.display()),
            }
        }

        Ok(roles)
    }

    /// Printer currently mapped to `role`
    pub async fn resolve(&self, role: PrintRole) -> Result<Option<String>> {
        Ok(self.load().await?.remove(&role))
    }

    /// Point `role` at `printer_name` and persist the whole mapping
    pub async fn update(&self, role: PrintRole, printer_name: &str) -> Result<RoleMap> {
        let _guard = self.write_lock.lock().await;

        let mut roles = self.load().await?;
        roles.insert(role, printer_name.to_string());

        let contents = serde_json::to_vec_pretty(&roles)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        info!("Role {} now prints on {}", role, printer_name);

        Ok(roles)
    }
}
