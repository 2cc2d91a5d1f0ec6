//! Headless browser engine used to rasterize HTML into PDF

use async_trait::async_trait;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::RenderError;

/// Install locations probed before asking the library for a default
const KNOWN_BROWSERS: &[&str] = &[
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/usr/bin/microsoft-edge",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
];

const REMEDIATION: &str = "install Google Chrome, Chromium or Microsoft Edge, \
     or point BROWSER_PATH at an installed Chromium-based browser";

/// Turns a complete HTML document into PDF bytes.
///
/// [`super::PdfRenderer`] never issues two calls at once, but a call it
/// abandoned on timeout may still be winding down while the next one runs.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError>;

    /// Launch ahead of the first render
    async fn warm_up(&self) -> Result<(), RenderError> {
        Ok(())
    }

    /// The last render overran its deadline; start fresh next time
    fn mark_unhealthy(&self) {}
}

/// The engine instance renders are handed.
///
/// The lock only guards the handle swap; renders hold their own `Arc`, so
/// a hung render never blocks the next one from launching a replacement.
/// An instance is torn down when its last holder lets go.
pub(crate) struct InstanceSlot<T> {
    current: Mutex<Option<Arc<T>>>,
}

impl<T> InstanceSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<T>>> {
        // Only ever holds a handle, so a panicking holder leaves nothing torn
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current instance, launching one if the slot is empty.
    ///
    /// The flag is true when this call launched it. `launch` runs without
    /// the lock held.
    pub(crate) fn get_or_launch<F>(&self, launch: F) -> Result<(Arc<T>, bool), RenderError>
    where
        F: FnOnce() -> Result<T, RenderError>,
    {
        if let Some(instance) = self.lock().clone() {
            return Ok((instance, false));
        }

        let launched = Arc::new(launch()?);
        let mut current = self.lock();
        match current.as_ref() {
            // Lost a race with another launch; ours is dropped
            Some(existing) => Ok((existing.clone(), false)),
            None => {
                *current = Some(launched.clone());
                Ok((launched, true))
            }
        }
    }

    /// Empty the slot if `instance` is still the current one
    pub(crate) fn discard(&self, instance: &Arc<T>) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, instance)) {
            *current = None;
        }
    }

    /// Take the current instance out of the slot
    pub(crate) fn reset(&self) -> Option<Arc<T>> {
        self.lock().take()
    }
}

impl<T> Default for InstanceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One long-lived Chromium instance per process
pub struct ChromeEngine {
    inner: Arc<ChromeInner>,
}

struct ChromeInner {
    configured_path: Option<PathBuf>,
    scratch_dir: PathBuf,
    page_timeout: Duration,
    browser: InstanceSlot<Browser>,
}

impl ChromeEngine {
    /// `scratch_dir` holds the HTML pages while they are loaded
    pub fn new(configured_path: Option<PathBuf>, scratch_dir: PathBuf, page_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ChromeInner {
                configured_path,
                scratch_dir,
                page_timeout,
                browser: InstanceSlot::new(),
            }),
        }
    }

    /// First usable browser binary: `BROWSER_PATH`, the known install
    /// locations, then whatever the library detects on `PATH`.
    pub fn locate_browser(configured: Option<&Path>) -> Result<PathBuf, RenderError> {
        if let Some(path) = configured {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            warn!("BROWSER_PATH {} does not exist, probing defaults", path.display());
        }

        if let Some(found) = KNOWN_BROWSERS.iter().map(Path::new).find(|p| p.exists()) {
            return Ok(found.to_path_buf());
        }

        headless_chrome::browser::default_executable().map_err(|e| {
            RenderError::EngineUnavailable(format!("{}; {}", e, REMEDIATION))
        })
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let inner = self.inner.clone();
        let html = html.to_string();
        // One budget for the whole render, retry included
        let deadline = Instant::now() + inner.page_timeout;
        tokio::task::spawn_blocking(move || inner.render_blocking(&html, deadline))
            .await
            .map_err(|e| RenderError::Engine(format!("render task failed: {}", e)))?
    }

    async fn warm_up(&self) -> Result<(), RenderError> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            inner.browser.get_or_launch(|| inner.launch())?;
            Ok::<_, RenderError>(())
        })
        .await
        .map_err(|e| RenderError::Engine(format!("warm-up task failed: {}", e)))?
    }

    fn mark_unhealthy(&self) {
        if self.inner.browser.reset().is_some() {
            warn!("Dropping rendering engine after a timed-out render; next render relaunches");
        }
    }
}

impl ChromeInner {
    fn launch(&self) -> Result<Browser, RenderError> {
        let path = ChromeEngine::locate_browser(self.configured_path.as_deref())?;

        let options = LaunchOptions::default_builder()
            .path(Some(path.clone()))
            .headless(true)
            // Keep the instance alive between jobs
            .idle_browser_timeout(Duration::from_secs(60 * 60 * 24 * 365))
            .build()
            .map_err(|e| RenderError::EngineUnavailable(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| {
            RenderError::EngineUnavailable(format!(
                "failed to launch {}: {}; {}",
                path.display(),
                e,
                REMEDIATION
            ))
        })?;

        info!("Rendering engine launched: {}", path.display());
        Ok(browser)
    }

    fn render_blocking(&self, html: &str, deadline: Instant) -> Result<Vec<u8>, RenderError> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let page = tempfile::Builder::new()
            .prefix("render-")
            .suffix(".html")
            .tempfile_in(&self.scratch_dir)?;
        std::fs::write(page.path(), html)?;
        let url = file_url(page.path());

        let (browser, fresh) = self.browser.get_or_launch(|| self.launch())?;
        match print_page(&browser, &url, deadline) {
            Ok(bytes) => Ok(bytes),
            // The connection of a long-idle instance may have dropped
            Err(e) if !fresh && Instant::now() < deadline => {
                warn!("Render failed on existing engine ({}), relaunching", e);
                self.browser.discard(&browser);
                drop(browser);

                let (browser, _) = self.browser.get_or_launch(|| self.launch())?;
                print_page(&browser, &url, deadline).map_err(|e| {
                    self.browser.discard(&browser);
                    RenderError::Engine(e.to_string())
                })
            }
            Err(e) => {
                self.browser.discard(&browser);
                Err(RenderError::Engine(e.to_string()))
            }
        }
    }
}

/// Time left before `deadline`, or an error once it has passed
fn remaining(deadline: Instant) -> anyhow::Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
        .ok_or_else(|| anyhow::anyhow!("render deadline passed"))
}

fn print_page(browser: &Browser, url: &str, deadline: Instant) -> anyhow::Result<Vec<u8>> {
    let tab = browser.new_tab()?;
    let result = load_and_print(&tab, url, deadline);

    if let Err(e) = tab.close(true) {
        warn!("Failed to close render tab: {}", e);
    }
    result
}

/// Each step only gets what is left of the shared deadline
fn load_and_print(tab: &Tab, url: &str, deadline: Instant) -> anyhow::Result<Vec<u8>> {
    tab.set_default_timeout(remaining(deadline)?);
    tab.navigate_to(url)?;

    tab.set_default_timeout(remaining(deadline)?);
    tab.wait_until_navigated()?;

    tab.set_default_timeout(remaining(deadline)?);
    tab.print_to_pdf(Some(PrintToPdfOptions {
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }))
}

fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url() {
        assert_eq!(file_url(Path::new("/tmp/a.html")), "file:///tmp/a.html");
        assert_eq!(
            file_url(Path::new(r"C:\Temp\a.html")),
            "file:///C:/Temp/a.html"
        );
    }

    #[test]
    fn test_configured_browser_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, "").unwrap();

        assert_eq!(ChromeEngine::locate_browser(Some(&fake)).unwrap(), fake);
    }

    #[test]
    fn test_slot_launches_once_and_reuses() {
        let slot = InstanceSlot::new();

        let (first, fresh) = slot.get_or_launch(|| Ok(1)).unwrap();
        assert!(fresh);
        let (second, fresh) = slot
            .get_or_launch(|| -> Result<i32, RenderError> { panic!("already running") })
            .unwrap();
        assert!(!fresh);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_slot_ignores_discard_of_replaced_instance() {
        let slot = InstanceSlot::new();
        let (stale, _) = slot.get_or_launch(|| Ok("stale")).unwrap();

        // A timed-out render's instance is reset while it is still held
        assert!(slot.reset().is_some());
        let (current, fresh) = slot.get_or_launch(|| Ok("current")).unwrap();
        assert!(fresh);

        // The abandoned render finishing later must not evict the new one
        slot.discard(&stale);
        let (after, _) = slot.get_or_launch(|| Ok("unexpected")).unwrap();
        assert!(Arc::ptr_eq(&current, &after));

        slot.discard(&current);
        assert!(slot.reset().is_none());
    }

    #[test]
    fn test_slot_launch_failure_leaves_slot_empty() {
        let slot: InstanceSlot<i32> = InstanceSlot::new();
        let err = slot
            .get_or_launch(|| Err(RenderError::EngineUnavailable("missing".to_string())))
            .unwrap_err();
        assert!(matches!(err, RenderError::EngineUnavailable(_)));
        assert!(slot.reset().is_none());
    }

    #[test]
    fn test_remaining_fails_past_deadline() {
        let deadline = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        assert!(remaining(deadline).is_err());
        assert!(remaining(Instant::now() + Duration::from_secs(5)).unwrap() > Duration::from_secs(4));
    }
}
