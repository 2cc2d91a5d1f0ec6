//! Configuration management for the Print Service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Origin of the hosted web app
pub const DEFAULT_APP_ORIGIN: &str = "https://app.tokoemas.id";

/// Narrowest paper layout the thermal renderer supports
pub const MIN_THERMAL_WIDTH: usize = 24;

/// Header and footer text printed on every document
#[derive(Debug, Clone, PartialEq)]
pub struct StoreProfile {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub footer: String,
    pub currency_prefix: String,
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            name: "TOKO EMAS".to_string(),
            address: None,
            phone: None,
            footer: "Terima kasih atas kunjungan Anda".to_string(),
            currency_prefix: "Rp ".to_string(),
        }
    }
}

/// External commands used by the page-printer fallback chain.
///
/// Each command is a template; `{printer}`, `{file}` and `{copies}` are
/// substituted per job. `None` disables the tier.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfCommands {
    pub utility: Option<String>,
    pub viewer: Option<String>,
    pub browser: Option<String>,
}

impl Default for PdfCommands {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                utility: Some(
                    "SumatraPDF.exe -print-to {printer} -print-settings {copies}x -silent {file}"
                        .to_string(),
                ),
                viewer: Some("AcroRd32.exe /t {file} {printer}".to_string()),
                browser: Some(
                    "msedge.exe --headless --disable-gpu --kiosk-printing {file}".to_string(),
                ),
            }
        } else {
            Self {
                utility: Some("lp -d {printer} -n {copies} {file}".to_string()),
                viewer: None,
                browser: None,
            }
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Persisted role → printer mapping
    pub role_config_path: PathBuf,

    /// Directory for rendered artifacts
    pub artifact_dir: PathBuf,

    /// Hard limit for a single PDF render
    pub render_timeout: Duration,

    /// How long finished jobs stay queryable
    pub job_retention: Duration,

    /// Interval of the job and artifact sweeps
    pub sweep_interval: Duration,

    /// Delay before a dispatched artifact is deleted
    pub cleanup_delay: Duration,

    /// Age after which a leftover artifact is swept
    pub orphan_max_age: Duration,

    /// Browser binary to probe before the built-in candidates
    pub browser_path: Option<PathBuf>,

    /// Origins allowed to call the service
    pub allowed_origins: Vec<String>,

    /// Characters per thermal line
    pub thermal_width: usize,

    /// Blank lines fed before the cut
    pub cut_feed_lines: usize,

    /// Store header/footer
    pub store: StoreProfile,

    /// Page-printer commands
    pub pdf_commands: PdfCommands,

    /// Printers reachable through a device file, by printer name
    pub raw_ports: HashMap<String, PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let defaults = StoreProfile::default();
        let pdf_defaults = PdfCommands::default();

        let config = Config {
            api_host: env::var("PRINT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),

            api_port: parse_var("PRINT_PORT", 3001)?,

            role_config_path: env::var("ROLE_CONFIG_PATH")
                .unwrap_or_else(|_| "./printer-config.json".to_string())
                .into(),

            artifact_dir: env::var("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("print-service")),

            render_timeout: Duration::from_secs(parse_var("RENDER_TIMEOUT_SECS", 30)?),
            job_retention: Duration::from_secs(parse_var("JOB_RETENTION_SECS", 300)?),
            sweep_interval: Duration::from_secs(parse_var("SWEEP_INTERVAL_SECS", 60)?),
            cleanup_delay: Duration::from_secs(parse_var("CLEANUP_DELAY_SECS", 10)?),
            orphan_max_age: Duration::from_secs(parse_var("ORPHAN_MAX_AGE_SECS", 3600)?),

            browser_path: env::var("BROWSER_PATH").ok().map(PathBuf::from),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|value| parse_list(&value))
                .unwrap_or_else(|_| {
                    vec![
                        DEFAULT_APP_ORIGIN.to_string(),
                        "http://localhost:5173".to_string(),
                        "http://localhost:3000".to_string(),
                    ]
                }),

            thermal_width: parse_var("THERMAL_WIDTH", 38)?,
            cut_feed_lines: parse_var("CUT_FEED_LINES", 6)?,

            store: StoreProfile {
                name: env::var("STORE_NAME").unwrap_or(defaults.name),
                address: env::var("STORE_ADDRESS").ok(),
                phone: env::var("STORE_PHONE").ok(),
                footer: env::var("RECEIPT_FOOTER").unwrap_or(defaults.footer),
                currency_prefix: env::var("CURRENCY_PREFIX").unwrap_or(defaults.currency_prefix),
            },

            pdf_commands: PdfCommands {
                utility: optional_command("PDF_UTILITY_COMMAND", pdf_defaults.utility),
                viewer: optional_command("PDF_VIEWER_COMMAND", pdf_defaults.viewer),
                browser: optional_command("PDF_BROWSER_COMMAND", pdf_defaults.browser),
            },

            raw_ports: env::var("RAW_PORTS")
                .map(|value| parse_port_map(&value))
                .unwrap_or_else(|_| Ok(HashMap::new()))
                .context("Invalid RAW_PORTS (expected printer=device,...)")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("PRINT_PORT must be greater than 0");
        }

        if self.render_timeout.is_zero() {
            anyhow::bail!("RENDER_TIMEOUT_SECS must be greater than 0");
        }

        if self.sweep_interval.is_zero() {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be greater than 0");
        }

        if self.thermal_width < MIN_THERMAL_WIDTH {
            anyhow::bail!("THERMAL_WIDTH must be at least {}", MIN_THERMAL_WIDTH);
        }

        if self.allowed_origins.is_empty() {
            anyhow::bail!("ALLOWED_ORIGINS must list at least one origin");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Ensure the artifact directory exists
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.artifact_dir).with_context(|| {
            format!(
                "Failed to create artifact directory: {}",
                self.artifact_dir.display()
            )
        })?;

        if let Some(parent) = self.role_config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

fn optional_command(name: &str, default: Option<String>) -> Option<String> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() || value.trim() == "none" => None,
        Ok(value) => Some(value),
        Err(_) => default,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().trim_end_matches('/').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_port_map(value: &str) -> Result<HashMap<String, PathBuf>> {
    let mut ports = HashMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (printer, device) = entry
            .split_once('=')
            .with_context(|| format!("missing '=' in '{}'", entry))?;
        ports.insert(printer.trim().to_string(), PathBuf::from(device.trim()));
    }
    Ok(ports)
}
