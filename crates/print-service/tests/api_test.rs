//! Integration tests for the Print Service HTTP API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use print_common::PrinterInfo;
use print_service::{
    config::StoreProfile,
    create_router,
    dispatch::{DispatchError, DispatchRequest, DispatchStrategy, DispatchTier},
    render::RenderError,
    AppState, ArtifactStore, Dispatcher, DocumentRenderer, PdfRenderer, PrinterDirectory,
    QueueManager, RenderEngine, RoleStore, Templates, ThermalLayout,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower::ServiceExt; // for `oneshot`

const APP_ORIGIN: &str = "https://app.tokoemas.id";

struct FakeEngine {
    delay: Duration,
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        tokio::time::sleep(self.delay).await;
        assert!(html.contains("<html"));
        Ok(b"%PDF-1.7 fake".to_vec())
    }
}

struct FakePrinters;

#[async_trait]
impl PrinterDirectory for FakePrinters {
    async fn list_printers(&self) -> Result<Vec<PrinterInfo>, DispatchError> {
        Ok(["POS-58", "EPSON-L3110", "HP-LaserJet"]
            .iter()
            .map(|name| PrinterInfo {
                name: name.to_string(),
                is_default: *name == "EPSON-L3110",
                state: Some("idle".to_string()),
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
struct Sent {
    printer: String,
    bytes: Vec<u8>,
    copies: u32,
}

struct Recorder {
    tier: DispatchTier,
    fail: bool,
    sent: Arc<Mutex<Vec<Sent>>>,
}

#[async_trait]
impl DispatchStrategy for Recorder {
    fn tier(&self) -> DispatchTier {
        self.tier
    }

    async fn send(&self, request: &DispatchRequest<'_>) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::CommandFailed {
                program: "lp".into(),
                status: "exit status: 1".into(),
                stderr: "printer is offline".into(),
            });
        }
        let bytes = std::fs::read(request.file)?;
        self.sent.lock().unwrap().push(Sent {
            printer: request.printer.to_string(),
            bytes,
            copies: request.copies,
        });
        Ok(())
    }
}

#[derive(Default)]
struct Options {
    fail_dispatch: bool,
    render_delay: Duration,
    render_timeout: Option<Duration>,
}

struct TestApp {
    router: Router,
    sent: Arc<Mutex<Vec<Sent>>>,
    dir: tempfile::TempDir,
}

/// Helper to create a test app backed by a temporary directory
fn create_test_app(options: Options) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(dir.path().join("artifacts"));
    let sent = Arc::new(Mutex::new(Vec::new()));

    let recorder = |tier| -> Arc<dyn DispatchStrategy> {
        Arc::new(Recorder {
            tier,
            fail: options.fail_dispatch,
            sent: sent.clone(),
        })
    };
    let dispatcher = Dispatcher::new(
        vec![recorder(DispatchTier::Spooler)],
        vec![recorder(DispatchTier::PrintUtility)],
        artifacts.clone(),
        Duration::from_millis(100),
    );

    let engine = Arc::new(FakeEngine {
        delay: options.render_delay,
    });
    let renderer = DocumentRenderer::new(
        Templates::builtin().unwrap(),
        PdfRenderer::spawn(
            engine,
            artifacts,
            options.render_timeout.unwrap_or(Duration::from_secs(5)),
        ),
        ThermalLayout::default(),
    );

    let state = AppState {
        queue: QueueManager::new(Duration::from_secs(60)),
        renderer,
        dispatcher: Arc::new(dispatcher),
        printers: Arc::new(FakePrinters),
        roles: RoleStore::new(dir.path().join("printer-config.json")),
        store: StoreProfile::default(),
        allowed_origins: vec![APP_ORIGIN.to_string()],
        started_at: Instant::now(),
    };

    TestApp {
        router: create_router(state),
        sent,
        dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
    )
    .await
}

async fn wait_for_job(app: &Router, job_id: &str) -> Value {
    for _ in 0..300 {
        let (status, job) = get(app, &format!("/job/{}", job_id)).await;
        assert_eq!(status, StatusCode::OK);
        if job["status"] == "completed" || job["status"] == "error" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", job_id);
}

fn receipt_body() -> Value {
    json!({
        "items": [
            { "kode": "CK01", "nama": "Cincin", "kadar": "24K", "berat": 3.25, "harga": 100000 }
        ],
        "total": 100000,
        "paymentMethod": "deposit",
        "deposit": 40000,
        "salesName": "Sari",
        "date": "12/03/2024"
    })
}

fn artifact_count(app: &TestApp) -> usize {
    std::fs::read_dir(app.dir.path().join("artifacts"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(Options::default());

    let (status, json) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "print-service");
    assert!(json["uptime"].is_u64());
}

#[tokio::test]
async fn test_print_receipt_queues_and_completes() {
    let app = create_test_app(Options::default());

    let (status, json) = post(&app.router, "/print/receipt", receipt_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["printer"], "POS-58");
    assert_eq!(json["queueStatus"]["printerName"], "POS-58");
    let job_id = json["jobID"].as_str().unwrap().to_string();

    let job = wait_for_job(&app.router, &job_id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"]["mode"], "raw");
    assert_eq!(job["result"]["tier"], "spooler");
    assert_eq!(job["metadata"]["role"], "receipt");

    let sent = app.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].printer, "POS-58");
    assert!(sent[0].bytes.starts_with(b"\x1b@"));
    let text = String::from_utf8_lossy(&sent[0].bytes).to_string();
    assert!(text.contains("Rp 60.000"));
}

#[tokio::test]
async fn test_print_receipt_rejects_empty_items() {
    let app = create_test_app(Options::default());

    let (status, json) = post(&app.router, "/print/receipt", json!({ "items": [] })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("at least one line item"));
    assert!(app.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_print_invoice_renders_pdf_with_generated_number() {
    let app = create_test_app(Options::default());

    let (status, json) = post(
        &app.router,
        "/print/invoice",
        json!({
            "items": [{ "name": "Gelang", "price": 2500000 }],
            "customer": { "name": "Budi", "phone": "0812" },
            "total": 2500000,
            "copies": 2
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["printer"], "EPSON-L3110");
    let invoice_number = json["invoiceNumber"].as_str().unwrap();
    assert!(invoice_number.starts_with("INV-"));
    assert_eq!(invoice_number.len(), "INV-YYYYMMDD-XXXXXX".len());

    let job = wait_for_job(&app.router, json["jobID"].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"]["mode"], "pdf");
    assert_eq!(job["result"]["tier"], "print-utility");
    assert_eq!(job["metadata"]["invoiceNumber"], invoice_number);

    let sent = app.sent.lock().unwrap().clone();
    assert_eq!(sent[0].bytes, b"%PDF-1.7 fake");
    assert_eq!(sent[0].copies, 2);
}

#[tokio::test]
async fn test_notes_use_page_printer() {
    let app = create_test_app(Options::default());

    for uri in ["/print/nota-servis", "/print/nota-custom"] {
        let (status, json) = post(&app.router, uri, receipt_body()).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(json["printer"], "EPSON-L3110");

        let job = wait_for_job(&app.router, json["jobID"].as_str().unwrap()).await;
        assert_eq!(job["result"]["mode"], "pdf");
    }
}

#[tokio::test]
async fn test_receipt_pdf_format() {
    let app = create_test_app(Options::default());

    let mut body = receipt_body();
    body["format"] = json!("pdf");
    let (status, json) = post(&app.router, "/print/receipt", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["printer"], "POS-58");

    let job = wait_for_job(&app.router, json["jobID"].as_str().unwrap()).await;
    assert_eq!(job["result"]["mode"], "pdf");
}

#[tokio::test]
async fn test_render_timeout_returns_gateway_timeout() {
    let app = create_test_app(Options {
        render_delay: Duration::from_millis(500),
        render_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    });

    let (status, json) = post(
        &app.router,
        "/print/invoice",
        json!({ "items": [{ "name": "Gelang", "price": 1000 }] }),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(json["error"].as_str().unwrap().contains("timed out"));

    let (_, queues) = get(&app.router, "/queue/status").await;
    assert!(queues["queues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_dispatch_failure_is_reported_on_job() {
    let app = create_test_app(Options {
        fail_dispatch: true,
        ..Default::default()
    });

    let (status, json) = post(&app.router, "/print/receipt", receipt_body()).await;
    assert_eq!(status, StatusCode::OK);

    let job = wait_for_job(&app.router, json["jobID"].as_str().unwrap()).await;
    assert_eq!(job["status"], "error");
    assert!(job["error"].as_str().unwrap().contains("printer is offline"));

    // Failed artifacts are removed right away
    assert_eq!(artifact_count(&app), 0);

    // The queue moves on
    let (_, second) = post(&app.router, "/print/receipt", receipt_body()).await;
    let job = wait_for_job(&app.router, second["jobID"].as_str().unwrap()).await;
    assert_eq!(job["status"], "error");
}

#[tokio::test]
async fn test_artifact_removed_after_cleanup_delay() {
    let app = create_test_app(Options::default());

    let (_, json) = post(
        &app.router,
        "/print/invoice",
        json!({ "items": [{ "name": "Kalung", "price": 1000 }] }),
    )
    .await;
    wait_for_job(&app.router, json["jobID"].as_str().unwrap()).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(artifact_count(&app), 0);
}

#[tokio::test]
async fn test_job_not_found() {
    let app = create_test_app(Options::default());

    let (status, json) = get(&app.router, "/job/does-not-exist").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_list_printers_includes_role_config() {
    let app = create_test_app(Options::default());

    let (status, json) = get(&app.router, "/printers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["printers"].as_array().unwrap().len(), 3);
    assert_eq!(json["defaultPrinter"], "EPSON-L3110");
    assert_eq!(json["config"]["receipt"], "POS-58");
    assert_eq!(json["config"]["invoice"], "EPSON-L3110");
}

#[tokio::test]
async fn test_config_update_redirects_role() {
    let app = create_test_app(Options::default());

    let (status, json) = post(
        &app.router,
        "/printers/config",
        json!({ "type": "invoice", "printerName": "HP-LaserJet" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["invoice"], "HP-LaserJet");
    assert!(app.dir.path().join("printer-config.json").exists());

    let (_, json) = post(
        &app.router,
        "/print/invoice",
        json!({ "items": [{ "name": "Gelang", "price": 1000 }] }),
    )
    .await;
    assert_eq!(json["printer"], "HP-LaserJet");
}

#[tokio::test]
async fn test_config_update_validation() {
    let app = create_test_app(Options::default());

    let (status, _) = post(
        &app.router,
        "/printers/config",
        json!({ "type": "label", "printerName": "POS-58" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = post(
        &app.router,
        "/printers/config",
        json!({ "type": "receipt", "printerName": "Ghost" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("Ghost"));
}

#[tokio::test]
async fn test_unavailable_printer_rejected_before_queueing() {
    let app = create_test_app(Options::default());
    std::fs::write(
        app.dir.path().join("printer-config.json"),
        r#"{ "receipt": "Unplugged-58" }"#,
    )
    .unwrap();

    let (status, json) = post(&app.router, "/print/receipt", receipt_body()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("Unplugged-58"));
    let (_, queues) = get(&app.router, "/queue/status").await;
    assert!(queues["queues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_queue_status_endpoints() {
    let app = create_test_app(Options::default());

    let (_, json) = post(&app.router, "/print/receipt", receipt_body()).await;
    wait_for_job(&app.router, json["jobID"].as_str().unwrap()).await;

    let (status, all) = get(&app.router, "/queue/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["queues"][0]["printerName"], "POS-58");
    assert_eq!(all["queues"][0]["state"], "idle");

    let (status, one) = get(&app.router, "/queue/POS-58").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["pending"], 0);
    assert_eq!(one["processing"], false);
}

#[tokio::test]
async fn test_cors_preflight_allows_private_network() {
    let app = create_test_app(Options::default());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/print/receipt")
                .header("origin", APP_ORIGIN)
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .header("access-control-request-private-network", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        APP_ORIGIN
    );
    assert_eq!(
        headers.get("access-control-allow-private-network").unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_rejects_unknown_origin() {
    let app = create_test_app(Options::default());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
