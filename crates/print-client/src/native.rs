//! Printing without the service
//!
//! When the daemon is down the document is rendered as a plain HTML page and
//! handed to the desktop, so the operator prints it from the viewer's own
//! print dialog.

use async_trait::async_trait;
use print_common::{format_number, PrintRequest, PrintRole};
use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// File-name prefix of every page this printer writes
const PAGE_PREFIX: &str = "print-fallback-";

/// How long a page is kept for the viewer before it is swept
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Error, Debug)]
pub enum NativeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with {status}")]
    Opener { program: String, status: String },
}

/// The environment's own print path
#[async_trait]
pub trait NativePrinter: Send + Sync {
    async fn print(&self, role: PrintRole, request: &PrintRequest) -> Result<(), NativeError>;
}

/// Opens an HTML rendition with the platform's default viewer.
///
/// The viewer reads the page after `print` returns, so pages are left on
/// disk and swept once they are older than `max_age`.
#[derive(Debug, Clone)]
pub struct SystemViewerPrinter {
    dir: PathBuf,
    max_age: Duration,
}

impl SystemViewerPrinter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Remove pages older than `max_age`; returns how many were deleted
    pub async fn sweep_stale(&self) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_string_lossy().starts_with(PAGE_PREFIX) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age >= self.max_age {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
                }
            }
        }

        if removed > 0 {
            debug!("Removed {} stale fallback pages", removed);
        }
        Ok(removed)
    }

    fn opener() -> (&'static str, Vec<&'static str>) {
        if cfg!(target_os = "windows") {
            ("cmd", vec!["/C", "start", ""])
        } else if cfg!(target_os = "macos") {
            ("open", vec![])
        } else {
            ("xdg-open", vec![])
        }
    }
}

impl Default for SystemViewerPrinter {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("print-client"))
    }
}

#[async_trait]
impl NativePrinter for SystemViewerPrinter {
    async fn print(&self, role: PrintRole, request: &PrintRequest) -> Result<(), NativeError> {
        if let Err(e) = self.sweep_stale().await {
            warn!("Fallback page sweep failed: {}", e);
        }

        let dir = self.dir.clone();
        let html = render_html(role, request);
        let path = tokio::task::spawn_blocking(move || write_page(&dir, &html))
            .await
            .map_err(io::Error::other)??;

        let (program, args) = Self::opener();
        info!("Opening {} with {}", path.display(), program);

        let status = Command::new(program).args(args).arg(&path).status().await?;
        if !status.success() {
            return Err(NativeError::Opener {
                program: program.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

fn write_page(dir: &Path, html: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::Builder::new()
        .prefix(PAGE_PREFIX)
        .suffix(".html")
        .tempfile_in(dir)?;
    file.write_all(html.as_bytes())?;
    // The viewer opens the file after we return
    file.into_temp_path().keep().map_err(|e| e.error)
}

fn title(role: PrintRole) -> &'static str {
    match role {
        PrintRole::Receipt => "NOTA PENJUALAN",
        PrintRole::Invoice => "INVOICE",
        PrintRole::ServiceNote => "NOTA SERVIS",
        PrintRole::CustomNote => "NOTA PESANAN",
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn rupiah(amount: i64) -> String {
    format!("Rp {}", format_number(amount))
}

/// Self-contained page that prints itself once loaded
pub fn render_html(role: PrintRole, request: &PrintRequest) -> String {
    let mut html = String::new();
    let title = title(role);

    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>body{{font-family:sans-serif;font-size:11pt}}td{{padding:2px 6px}}\
         .num{{text-align:right}}</style></head>\
         <body onload=\"window.print()\"><h2>{title}</h2>"
    );

    if let Some(number) = &request.invoice_number {
        let _ = write!(html, "<div>No. {}</div>", escape(number));
    }
    if let Some(date) = &request.date {
        let _ = write!(html, "<div>{}</div>", escape(date));
    }
    if let Some(name) = request.customer.as_ref().and_then(|c| c.name.as_deref()) {
        let _ = write!(html, "<div>Pelanggan: {}</div>", escape(name));
    }

    html.push_str("<table>");
    for item in &request.items {
        let mut detail = Vec::new();
        if let Some(purity) = &item.purity {
            detail.push(escape(purity));
        }
        if let Some(weight) = item.weight {
            detail.push(format!("{}g", weight));
        }
        let _ = write!(
            html,
            "<tr><td>{} x {}</td><td>{}</td><td class=\"num\">{}</td></tr>",
            item.quantity,
            escape(&item.name),
            detail.join(" / "),
            rupiah(item.price)
        );
    }
    html.push_str("</table>");

    let settlement = request.settlement();
    let _ = write!(html, "<p><b>Total: {}</b></p>", rupiah(request.total()));
    if let Some(deposit) = settlement.deposit {
        let _ = write!(html, "<div>DP: {}</div>", rupiah(deposit));
    }
    if settlement.fully_paid {
        html.push_str("<div><b>LUNAS</b></div>");
    } else {
        let _ = write!(html, "<div>Sisa: {}</div>", rupiah(settlement.remainder));
    }
    if let Some(notes) = &request.notes {
        let _ = write!(html, "<p>{}</p>", escape(notes));
    }

    html.push_str("</body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use print_common::{LineItem, Payment, PaymentMethod};

    fn request() -> PrintRequest {
        PrintRequest {
            items: vec![LineItem {
                name: "Cincin <Emas>".into(),
                quantity: 1,
                weight: Some(3.5),
                price: 1_250_000,
                ..Default::default()
            }],
            payment: Payment {
                payment_method: PaymentMethod::Deposit,
                deposit: Some(250_000),
                channel: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_render_html_escapes_and_settles() {
        let html = render_html(PrintRole::Invoice, &request());

        assert!(html.contains("<title>INVOICE</title>"));
        assert!(html.contains("Cincin &lt;Emas&gt;"));
        assert!(html.contains("Total: Rp 1.250.000"));
        assert!(html.contains("DP: Rp 250.000"));
        assert!(html.contains("Sisa: Rp 1.000.000"));
        assert!(html.contains("window.print()"));
    }

    #[test]
    fn test_render_html_fully_paid() {
        let mut request = request();
        request.payment = Payment::default();

        let html = render_html(PrintRole::Receipt, &request);
        assert!(html.contains("LUNAS"));
        assert!(!html.contains("Sisa"));
    }

    #[test]
    fn test_rupiah_uses_shared_grouping() {
        assert_eq!(rupiah(0), "Rp 0");
        assert_eq!(rupiah(1000), "Rp 1.000");
        assert_eq!(rupiah(-15000), "Rp -15.000");
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_pages() {
        let dir = tempfile::tempdir().unwrap();
        let printer = SystemViewerPrinter::new(dir.path()).with_max_age(Duration::from_secs(600));

        let old = dir.path().join("print-fallback-old.html");
        let recent = dir.path().join("print-fallback-recent.html");
        let foreign = dir.path().join("notes.html");
        for path in [&old, &recent, &foreign] {
            std::fs::write(path, "<html></html>").unwrap();
        }
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        for path in [&old, &foreign] {
            std::fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(an_hour_ago)
                .unwrap();
        }

        assert_eq!(printer.sweep_stale().await.unwrap(), 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_sweep_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let printer = SystemViewerPrinter::new(dir.path().join("never-created"));
        assert_eq!(printer.sweep_stale().await.unwrap(), 0);
    }
}
