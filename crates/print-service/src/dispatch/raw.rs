//! Thermal (raw byte) dispatch tiers

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::command::{CommandStrategy, CommandTemplate};
use super::{DispatchError, DispatchRequest, DispatchStrategy, DispatchTier};

/// Writes the byte stream straight to a device port.
///
/// On Unix only printers listed in `RAW_PORTS` qualify; on Windows a printer
/// without an explicit port is reached through its local share.
pub struct PortCopy {
    ports: HashMap<String, PathBuf>,
}

impl PortCopy {
    pub fn new(ports: HashMap<String, PathBuf>) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl DispatchStrategy for PortCopy {
    fn tier(&self) -> DispatchTier {
        DispatchTier::PortCopy
    }

    fn is_supported(&self, printer: &str) -> bool {
        cfg!(windows) || self.ports.contains_key(printer)
    }

    async fn send(&self, request: &DispatchRequest<'_>) -> Result<(), DispatchError> {
        let port = match self.ports.get(request.printer) {
            Some(port) => port.clone(),
            None if cfg!(windows) => PathBuf::from(format!(r"\\localhost\{}", request.printer)),
            None => return Err(DispatchError::Unsupported(DispatchTier::PortCopy)),
        };

        let bytes = tokio::fs::read(request.file).await?;
        let mut device = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&port)
            .await
            .map_err(|e| {
                std::io::Error::new(e.kind(), format!("cannot open {}: {}", port.display(), e))
            })?;
        device.write_all(&bytes).await?;
        device.flush().await?;
        Ok(())
    }
}

/// Degraded tier: strips control sequences and prints the remaining text as
/// an ordinary document
pub struct DrawingSurface {
    command: CommandTemplate,
}

impl DrawingSurface {
    pub fn new(command: CommandTemplate) -> Self {
        Self { command }
    }
}

#[async_trait]
impl DispatchStrategy for DrawingSurface {
    fn tier(&self) -> DispatchTier {
        DispatchTier::DrawingSurface
    }

    fn is_supported(&self, _printer: &str) -> bool {
        self.command.is_installed()
    }

    async fn send(&self, request: &DispatchRequest<'_>) -> Result<(), DispatchError> {
        let bytes = tokio::fs::read(request.file).await?;
        let text_path = request.file.with_extension("txt");
        tokio::fs::write(&text_path, strip_control_sequences(&bytes)).await?;

        let result = self
            .command
            .run(&DispatchRequest {
                file: &text_path,
                ..*request
            })
            .await;

        if let Err(e) = tokio::fs::remove_file(&text_path).await {
            warn!("Failed to remove {}: {}", text_path.display(), e);
        }
        result
    }
}

/// Remove ESC/GS command sequences, keeping printable text and newlines
pub fn strip_control_sequences(bytes: &[u8]) -> String {
    const ESC: u8 = 0x1B;
    const GS: u8 = 0x1D;

    let mut text = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            // ESC @ is the only two-byte command the renderer emits
            ESC if bytes.get(i + 1) == Some(&b'@') => i += 2,
            ESC | GS => i += 3,
            b'\n' => {
                text.push(b'\n');
                i += 1;
            }
            b if (0x20..0x7F).contains(&b) => {
                text.push(b);
                i += 1;
            }
            _ => i += 1,
        }
    }
    String::from_utf8_lossy(&text).into_owned()
}

/// Raw fallback chain for this host
pub fn raw_chain(ports: &HashMap<String, PathBuf>) -> Vec<Arc<dyn DispatchStrategy>> {
    let mut chain: Vec<Arc<dyn DispatchStrategy>> = vec![Arc::new(PortCopy::new(ports.clone()))];

    let (spooler, drawing) = if cfg!(windows) {
        (
            r#"cmd /C print "/D:{printer}" {file}"#,
            r#"powershell -NoProfile -Command "Get-Content -Path '{file}' | Out-Printer -Name '{printer}'""#,
        )
    } else {
        ("lp -d {printer} -o raw {file}", "lp -d {printer} {file}")
    };

    for (tier, template) in [(DispatchTier::Spooler, spooler), (DispatchTier::DrawingSurface, drawing)] {
        match CommandTemplate::parse(template) {
            Ok(command) if tier == DispatchTier::DrawingSurface => {
                chain.push(Arc::new(DrawingSurface::new(command)))
            }
            Ok(command) => chain.push(Arc::new(CommandStrategy::new(tier, command))),
            Err(e) => warn!("Skipping {:?}: {}", tier, e),
        }
    }

    chain
}
