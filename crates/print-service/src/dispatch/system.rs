//! Printer enumeration through the OS spooler

use async_trait::async_trait;
use print_common::PrinterInfo;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::warn;

use super::command::COMMAND_TIMEOUT;
use super::DispatchError;

/// Printers that can currently receive jobs
#[async_trait]
pub trait PrinterDirectory: Send + Sync {
    async fn list_printers(&self) -> Result<Vec<PrinterInfo>, DispatchError>;

    async fn is_available(&self, printer: &str) -> bool {
        match self.list_printers().await {
            Ok(printers) => printers.iter().any(|p| p.name == printer),
            Err(e) => {
                warn!("Printer enumeration failed: {}", e);
                false
            }
        }
    }
}

/// CUPS (`lpstat`) on Unix, `Win32_Printer` on Windows, plus any printer
/// mapped to a raw device port whose device exists
pub struct SystemPrinters {
    raw_ports: HashMap<String, PathBuf>,
}

impl SystemPrinters {
    pub fn new(raw_ports: HashMap<String, PathBuf>) -> Self {
        Self { raw_ports }
    }

    async fn query_spooler(&self) -> Result<Vec<PrinterInfo>, DispatchError> {
        if cfg!(windows) {
            let script = "Get-CimInstance Win32_Printer | \
                ForEach-Object { \"$($_.Name)|$($_.Default)|$($_.PrinterStatus)\" }";
            let stdout = capture("powershell", &["-NoProfile", "-Command", script]).await?;
            Ok(parse_win32_printers(&stdout))
        } else {
            let stdout = capture("lpstat", &["-p", "-d"]).await?;
            Ok(parse_lpstat(&stdout))
        }
    }
}

#[async_trait]
impl PrinterDirectory for SystemPrinters {
    async fn list_printers(&self) -> Result<Vec<PrinterInfo>, DispatchError> {
        let mut printers = match self.query_spooler().await {
            Ok(printers) => printers,
            Err(e) if !self.raw_ports.is_empty() => {
                warn!("Spooler query failed, listing raw ports only: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let mut raw: Vec<(&String, &PathBuf)> = self.raw_ports.iter().collect();
        raw.sort();
        for (name, device) in raw {
            if printers.iter().any(|p| &p.name == name) || !device.exists() {
                continue;
            }
            printers.push(PrinterInfo {
                name: name.clone(),
                is_default: false,
                state: Some(format!("port {}", device.display())),
            });
        }

        Ok(printers)
    }
}

async fn capture(program: &str, args: &[&str]) -> Result<String, DispatchError> {
    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    {
        command.creation_flags(0x0800_0000);
    }

    let output = tokio::time::timeout(COMMAND_TIMEOUT, command.output())
        .await
        .map_err(|_| DispatchError::CommandTimedOut {
            program: program.to_string(),
            timeout: COMMAND_TIMEOUT,
        })?
        .map_err(|source| DispatchError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    // lpstat exits non-zero when no default destination is set
    if !output.status.success() && stdout.trim().is_empty() {
        return Err(DispatchError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(stdout)
}

/// Parse `lpstat -p -d` output
pub fn parse_lpstat(output: &str) -> Vec<PrinterInfo> {
    let default = output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("system default destination:")
            .map(|name| name.trim().to_string())
    });

    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("printer ")?;
            let name = rest.split_whitespace().next()?;
            let state = if rest.contains("disabled") {
                "disabled"
            } else if rest.contains("printing") {
                "printing"
            } else if rest.contains("idle") {
                "idle"
            } else {
                "unknown"
            };
            Some(PrinterInfo {
                name: name.to_string(),
                is_default: default.as_deref() == Some(name),
                state: Some(state.to_string()),
            })
        })
        .collect()
}

/// Parse `Name|Default|PrinterStatus` lines
pub fn parse_win32_printers(output: &str) -> Vec<PrinterInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.trim().splitn(3, '|');
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let is_default = fields
                .next()
                .map(|d| d.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            let state = match fields.next().map(str::trim) {
                Some("3") => "idle",
                Some("4") => "printing",
                Some("7") => "offline",
                _ => "unknown",
            };
            Some(PrinterInfo {
                name: name.to_string(),
                is_default,
                state: Some(state.to_string()),
            })
        })
        .collect()
}
