//! Serialized access to the shared rendering engine
//!
//! Callers enqueue HTML and await a reply; a single worker task owns the
//! engine and handles requests strictly in arrival order, so only one page is
//! ever open. Every render runs under a hard deadline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::engine::RenderEngine;
use super::RenderError;
use crate::artifacts::ArtifactStore;

/// Renders that may wait behind the one in progress
const RENDER_QUEUE_CAPACITY: usize = 32;

struct RenderRequest {
    html: String,
    reply: oneshot::Sender<Result<Vec<u8>, RenderError>>,
}

#[derive(Clone)]
pub struct PdfRenderer {
    requests: mpsc::Sender<RenderRequest>,
    artifacts: ArtifactStore,
}

impl PdfRenderer {
    /// Start the render worker
    pub fn spawn(engine: Arc<dyn RenderEngine>, artifacts: ArtifactStore, timeout: Duration) -> Self {
        let (requests, receiver) = mpsc::channel(RENDER_QUEUE_CAPACITY);
        tokio::spawn(render_loop(engine, receiver, timeout));
        Self {
            requests,
            artifacts,
        }
    }

    /// Render `html` and return the PDF bytes
    pub async fn render(&self, html: String) -> Result<Vec<u8>, RenderError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(RenderRequest { html, reply })
            .await
            .map_err(|_| RenderError::Closed)?;
        response.await.map_err(|_| RenderError::Closed)?
    }

    /// Render `html` into a new PDF artifact owned by the caller
    pub async fn render_to_file(&self, html: String) -> Result<PathBuf, RenderError> {
        let bytes = self.render(html).await?;
        Ok(self.artifacts.write(bytes, ".pdf").await?)
    }
}

async fn render_loop(
    engine: Arc<dyn RenderEngine>,
    mut receiver: mpsc::Receiver<RenderRequest>,
    timeout: Duration,
) {
    while let Some(request) = receiver.recv().await {
        debug!("Rendering PDF ({} bytes of HTML)", request.html.len());

        let result = match tokio::time::timeout(timeout, engine.render_pdf(&request.html)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("PDF render exceeded {:?}", timeout);
                engine.mark_unhealthy();
                Err(RenderError::Timeout(timeout))
            }
        };

        // The caller may have gone away; nothing to do then
        let _ = request.reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::engine::InstanceSlot;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::sync::Mutex;

    /// Echoes the HTML back; `slow` pages take longer than any test deadline
    #[derive(Default)]
    struct FakeEngine {
        active: AtomicUsize,
        max_active: AtomicUsize,
        unhealthy: AtomicBool,
        order: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RenderEngine for FakeEngine {
        async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);

            let delay = if html == "slow" { 1_000 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.order.lock().await.push(html.to_string());
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("%PDF-{}", html).into_bytes())
        }

        fn mark_unhealthy(&self) {
            self.unhealthy.store(true, Ordering::SeqCst);
        }
    }

    fn renderer(engine: Arc<FakeEngine>, dir: &std::path::Path, timeout: Duration) -> PdfRenderer {
        PdfRenderer::spawn(engine, ArtifactStore::new(dir), timeout)
    }

    #[tokio::test]
    async fn test_concurrent_renders_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let renderer = renderer(engine.clone(), dir.path(), Duration::from_secs(5));

        let mut handles = Vec::new();
        for i in 0..5 {
            let renderer = renderer.clone();
            handles.push(tokio::spawn(async move {
                renderer.render(format!("page-{}", i)).await
            }));
            // Enqueue in a known order
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(engine.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(
            *engine.order.lock().await,
            (0..5).map(|i| format!("page-{}", i)).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_timeout_surfaces_error_and_engine_stays_usable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let renderer = renderer(engine.clone(), dir.path(), Duration::from_millis(100));

        let err = renderer.render("slow".to_string()).await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
        assert!(engine.unhealthy.load(Ordering::SeqCst));

        let bytes = renderer.render("next".to_string()).await.unwrap();
        assert_eq!(bytes, b"%PDF-next");
    }

    /// Renders on a blocking thread against a shared instance, the way the
    /// browser engine does; `slow` pages hang the thread well past the deadline
    #[derive(Default)]
    struct BlockingEngine {
        slot: Arc<InstanceSlot<Instance>>,
        launches: Arc<AtomicUsize>,
    }

    struct Instance {
        id: usize,
    }

    #[async_trait]
    impl RenderEngine for BlockingEngine {
        async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
            let slot = self.slot.clone();
            let launches = self.launches.clone();
            let html = html.to_string();
            tokio::task::spawn_blocking(move || {
                let (instance, _) = slot.get_or_launch(|| {
                    Ok(Instance {
                        id: launches.fetch_add(1, Ordering::SeqCst) + 1,
                    })
                })?;
                if html == "slow" {
                    std::thread::sleep(Duration::from_millis(1_500));
                    slot.discard(&instance);
                }
                Ok(format!("%PDF-{}-{}", html, instance.id).into_bytes())
            })
            .await
            .map_err(|e| RenderError::Engine(e.to_string()))?
        }

        fn mark_unhealthy(&self) {
            self.slot.reset();
        }
    }

    #[tokio::test]
    async fn test_hung_render_does_not_block_the_next_one() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(BlockingEngine::default());
        let renderer = PdfRenderer::spawn(
            engine.clone(),
            ArtifactStore::new(dir.path()),
            Duration::from_millis(200),
        );

        assert_eq!(renderer.render("warm".to_string()).await.unwrap(), b"%PDF-warm-1");

        let started = Instant::now();
        let err = renderer.render("slow".to_string()).await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));

        // Served by a fresh instance while the hung thread is still asleep
        let bytes = renderer.render("fast".to_string()).await.unwrap();
        assert_eq!(bytes, b"%PDF-fast-2");
        assert!(started.elapsed() < Duration::from_millis(1_000));

        // The abandoned thread finishing must not evict the replacement
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let bytes = renderer.render("again".to_string()).await.unwrap();
        assert_eq!(bytes, b"%PDF-again-2");
        assert_eq!(engine.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_render_to_file_hands_over_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let renderer = renderer(engine, dir.path(), Duration::from_secs(5));

        let path = renderer.render_to_file("invoice".to_string()).await.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().unwrap(), "pdf");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-invoice");
    }
}
