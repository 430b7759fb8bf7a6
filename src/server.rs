//! HTTP API and static UI for driving simulated scans from a browser.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::{
    export::ExportFormat,
    history::HistoryStore,
    ports,
    results::{self, ResultQuery, ResultStats, SortDirection, SortField, StatusFilter},
    scanner::{self, Orchestrator, ScanError, ScanPhase},
    types::{HistoryEntry, PortInfo, Progress, ScanEvent, ScanResult, ScanType},
    validate::{self, Validation},
};

/// History backend shared by the HTTP handlers.
pub type SharedHistory = Box<dyn HistoryStore + Send>;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator<SharedHistory>>,
    inner: Arc<RwLock<ServerState>>, // latest scan's request and cancel handle
}

#[derive(Debug, Default)]
struct ServerState {
    scan_id: u64,
    target: Option<String>,
    scan_type: Option<ScanType>,
    estimated_secs: f64,
    cancel: Option<CancellationToken>,
}

impl ServerState {
    /// Drop the cancel handle of `scan_id` unless a newer scan has replaced it.
    fn finish(&mut self, scan_id: u64) {
        if self.scan_id == scan_id {
            self.cancel = None;
        }
    }
}

impl AppState {
    pub fn new(orchestrator: Orchestrator<SharedHistory>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            inner: Arc::new(RwLock::new(ServerState::default())),
        }
    }
}

// ---------------------------------------------------------------------------
// API error
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, key, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => {
                warn!(details = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };
        (
            status,
            Json(ApiErrorBody {
                error: key.into(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Invalid(v) => ApiError::BadRequest(v.to_string()),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub state: ScanPhase,
    pub target: Option<String>,
    pub scan_type: Option<ScanType>,
    pub total: u64,
    pub scanned: u64,
    pub open: u64,
    pub current_port: u64,
    pub percent_complete: f64,
    pub estimated_remaining_time: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub target: String,
    #[serde(default)]
    pub scan_type: ScanType,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub target: String,
}

/// Query string of `GET /api/results`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResultsParams {
    pub status: StatusFilter,
    pub q: String,
    pub sort: SortField,
    pub dir: SortDirection,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsBody {
    pub target: String,
    pub scan_date: String,
    pub duration: u64,
    pub stats: ResultStats,
    pub results: results::Page<ScanResult>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the API router plus the static UI fallback served from `ui_dir`.
pub fn router(state: AppState, ui_dir: impl AsRef<Path>) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/validate", post(post_validate))
        .route("/scan", post(post_scan))
        .route("/scan/cancel", post(post_cancel))
        .route("/results", get(get_results))
        .route("/export/{format}", get(get_export))
        .route("/history", get(get_history).delete(delete_history))
        .route("/ports/{port}", get(get_port))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state);

    let static_svc = ServeDir::new(ui_dir.as_ref()).append_index_html_on_directories(true);

    Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, state: AppState, ui_dir: impl AsRef<Path>) -> Result<()> {
    let app = router(state, ui_dir);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("serving UI on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_status(State(app): State<AppState>) -> Json<Status> {
    let s = app.inner.read().await;
    Json(current_status(&app, &s))
}

fn current_status(app: &AppState, s: &ServerState) -> Status {
    let snap = app.orchestrator.progress().snapshot();
    let state = app.orchestrator.phase();
    let (percent_complete, estimated_remaining_time) = if snap.total == 0 || snap.scanned == 0 {
        (0.0, s.estimated_secs)
    } else {
        let p = Progress::new(
            snap.current_port as u16,
            snap.scanned as usize - 1,
            snap.total as usize,
            s.estimated_secs,
        );
        (p.percent_complete, p.estimated_remaining_time)
    };
    Status {
        state,
        target: s.target.clone(),
        scan_type: s.scan_type,
        total: snap.total,
        scanned: snap.scanned,
        open: snap.open,
        current_port: snap.current_port,
        percent_complete,
        estimated_remaining_time,
    }
}

async fn post_validate(Json(req): Json<ValidateRequest>) -> Json<Validation> {
    Json(validate::validate(&req.target).into())
}

async fn post_scan(
    State(app): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Holding the write lock across `begin` keeps request state in scan order.
    let mut s = app.inner.write().await;
    let ticket = app.orchestrator.begin(&req.target, req.scan_type)?;
    let scan_id = ticket.id();
    let cancel = CancellationToken::new();
    s.scan_id = scan_id;
    s.target = Some(ticket.target().to_string());
    s.scan_type = Some(ticket.scan_type());
    s.estimated_secs = ticket.estimated_duration().as_secs_f64();
    s.cancel = Some(cancel.clone());
    let status = current_status(&app, &s);
    drop(s);

    let orchestrator = app.orchestrator.clone();
    let inner = app.inner.clone();
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let res = orchestrator
            .execute(ticket, &mut rng, &cancel, |ev| {
                if let ScanEvent::Progress(p) = ev {
                    debug!(port = p.current_port, percent = p.percent_complete, "progress");
                }
            })
            .await;

        if let Err(e) = res {
            info!(scan_id, "scan ended without results: {e}");
        }
        inner.write().await.finish(scan_id);
    });

    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn post_cancel(State(app): State<AppState>) -> Result<StatusCode, ApiError> {
    let s = app.inner.read().await;
    match s.cancel.as_ref() {
        Some(c) => {
            c.cancel();
            Ok(StatusCode::ACCEPTED)
        }
        None => Err(ApiError::Conflict("no scan in progress".into())),
    }
}

async fn get_results(
    State(app): State<AppState>,
    Query(params): Query<ResultsParams>,
) -> Response {
    let Some(report) = app.orchestrator.last_report() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let query = ResultQuery {
        status: params.status,
        search: params.q,
        sort: params.sort,
        direction: params.dir,
    };
    let rows: Vec<ScanResult> = query.apply(&report.results).into_iter().cloned().collect();
    let page = results::paginate(
        &rows,
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(results::DEFAULT_PER_PAGE),
    );
    Json(ResultsBody {
        stats: ResultStats::from_results(&report.results),
        target: report.target,
        scan_date: report.scan_date,
        duration: report.duration,
        results: page,
    })
    .into_response()
}

async fn get_export(
    State(app): State<AppState>,
    UrlPath(format): UrlPath<String>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = format.parse().map_err(ApiError::BadRequest)?;
    let report = app
        .orchestrator
        .last_report()
        .ok_or_else(|| ApiError::NotFound("no completed scan to export".into()))?;
    let body = format
        .render(&report)
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    let file_name = format.file_name(&report.target, scanner::now_millis());
    let disposition = format!("attachment; filename=\"{file_name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn get_history(State(app): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(app.orchestrator.history())
}

async fn delete_history(State(app): State<AppState>) -> Result<StatusCode, ApiError> {
    app.orchestrator
        .clear_history()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_port(UrlPath(port): UrlPath<u16>) -> Json<PortInfo> {
    Json(ports::lookup(port))
}
