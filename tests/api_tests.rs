use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use portscan_sim::history::{HistoryError, HistoryStore, MemoryHistory};
use portscan_sim::types::HistoryEntry;
use portscan_sim::scanner::{Orchestrator, ScanOptions};
use portscan_sim::server::{router, AppState, SharedHistory};

fn app(time_scale: f64) -> Router {
    let history: SharedHistory = Box::new(MemoryHistory::new());
    let state = AppState::new(Orchestrator::new(history, ScanOptions { time_scale }));
    router(state, "ui")
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

async fn wait_for_state(app: &Router, wanted: &str) -> Value {
    for _ in 0..200 {
        let (_, st) = send(app, "GET", "/api/status", None).await;
        if st["state"] == wanted {
            return st;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan never reached state {wanted}");
}

#[tokio::test]
async fn status_starts_idle() {
    let app = app(0.0);
    let (code, st) = send(&app, "GET", "/api/status", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(st["state"], "idle");
}

#[tokio::test]
async fn invalid_target_is_rejected() {
    let app = app(0.0);
    let (code, body) = send(
        &app,
        "POST",
        "/api/scan",
        Some(json!({ "target": "999.999.999.999", "scanType": "quick" })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(
        body["message"],
        "Invalid IPv4 address. Each octet must be 0-255."
    );
    let (_, history) = send(&app, "GET", "/api/history", None).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn scan_results_export_and_history() {
    let app = app(0.0);
    let (code, _) = send(&app, "GET", "/api/results", None).await;
    assert_eq!(code, StatusCode::NO_CONTENT);

    let (code, st) = send(
        &app,
        "POST",
        "/api/scan",
        Some(json!({ "target": "localhost", "scanType": "quick" })),
    )
    .await;
    assert_eq!(code, StatusCode::ACCEPTED);
    assert_eq!(st["total"], 15);

    let st = wait_for_state(&app, "complete").await;
    assert_eq!(st["scanned"], 15);
    assert_eq!(st["percentComplete"], 100.0);

    let (code, body) = send(&app, "GET", "/api/results?per_page=10&page=2", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["target"], "localhost");
    assert_eq!(body["stats"]["total"], 15);
    assert_eq!(body["results"]["totalPages"], 2);
    assert_eq!(body["results"]["items"].as_array().unwrap().len(), 5);

    let (code, body) = send(&app, "GET", "/api/results?q=ssh", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["results"]["items"][0]["port"], 22);

    let (code, body) = send(&app, "GET", "/api/export/json", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 15);

    let (code, body) = send(&app, "GET", "/api/export/csv", None).await;
    assert_eq!(code, StatusCode::OK);
    assert!(body
        .as_str()
        .unwrap()
        .starts_with("Port,Status,Service,Description,Risk,Recommendation\n"));

    let (code, _) = send(&app, "GET", "/api/export/pdf", None).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (_, history) = send(&app, "GET", "/api/history", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["totalPorts"], 15);
    assert_eq!(history[0]["scanType"], "QUICK");

    let (code, _) = send(&app, "DELETE", "/api/history", None).await;
    assert_eq!(code, StatusCode::NO_CONTENT);
    let (_, history) = send(&app, "GET", "/api/history", None).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn concurrent_scan_is_rejected_and_cancel_works() {
    let app = app(1.0);
    let (code, _) = send(
        &app,
        "POST",
        "/api/scan",
        Some(json!({ "target": "example.com", "scanType": "full" })),
    )
    .await;
    assert_eq!(code, StatusCode::ACCEPTED);

    let (code, body) = send(
        &app,
        "POST",
        "/api/scan",
        Some(json!({ "target": "example.com", "scanType": "quick" })),
    )
    .await;
    assert_eq!(code, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (code, _) = send(&app, "POST", "/api/scan/cancel", None).await;
    assert_eq!(code, StatusCode::ACCEPTED);
    wait_for_state(&app, "idle").await;

    let (_, history) = send(&app, "GET", "/api/history", None).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn cancel_without_scan_conflicts() {
    let app = app(0.0);
    let (code, _) = send(&app, "POST", "/api/scan/cancel", None).await;
    assert_eq!(code, StatusCode::CONFLICT);
}

#[tokio::test]
async fn port_lookup_and_validate() {
    let app = app(0.0);
    let (code, body) = send(&app, "GET", "/api/ports/3389", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["service"], "RDP");
    assert_eq!(body["risk"], "high");

    let (_, body) = send(&app, "GET", "/api/ports/4444", None).await;
    assert_eq!(body["service"], "Unknown");

    let (code, body) = send(
        &app,
        "POST",
        "/api/validate",
        Some(json!({ "target": "not a valid host!!" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

/// History whose writes take a while, like a slow disk.
struct SlowHistory(MemoryHistory);

impl HistoryStore for SlowHistory {
    fn load(&self) -> Vec<HistoryEntry> {
        self.0.load()
    }

    fn append(&mut self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>, HistoryError> {
        std::thread::sleep(Duration::from_millis(300));
        self.0.append(entry)
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        self.0.clear()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn results_available_once_status_is_complete() {
    let history: SharedHistory = Box::new(SlowHistory(MemoryHistory::new()));
    let state = AppState::new(Orchestrator::new(history, ScanOptions { time_scale: 0.0 }));
    let app = router(state, "ui");

    let (code, _) = send(
        &app,
        "POST",
        "/api/scan",
        Some(json!({ "target": "localhost", "scanType": "quick" })),
    )
    .await;
    assert_eq!(code, StatusCode::ACCEPTED);

    wait_for_state(&app, "complete").await;
    let (code, body) = send(&app, "GET", "/api/results", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["stats"]["total"], 15);
    let (code, _) = send(&app, "GET", "/api/export/txt", None).await;
    assert_eq!(code, StatusCode::OK);
}

#[tokio::test]
async fn new_scan_hides_previous_results() {
    let app = app(1.0);
    let (code, _) = send(
        &app,
        "POST",
        "/api/scan",
        Some(json!({ "target": "localhost", "scanType": "full" })),
    )
    .await;
    assert_eq!(code, StatusCode::ACCEPTED);
    let (code, _) = send(&app, "GET", "/api/results", None).await;
    assert_eq!(code, StatusCode::NO_CONTENT);
    let (code, _) = send(&app, "GET", "/api/export/json", None).await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    let (code, _) = send(&app, "POST", "/api/scan/cancel", None).await;
    assert_eq!(code, StatusCode::ACCEPTED);
}
