//! Scan orchestration: one scan at a time, paced port by port, cancellable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use rand::Rng;
use serde::Serialize;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::history::{self, HistoryError, HistoryStore};
use crate::ports;
use crate::simulator::{self, ScanPlan};
use crate::types::{HistoryEntry, PortStatus, Progress, ScanEvent, ScanReport, ScanType};
use crate::validate::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("a scan is already in progress")]
    Busy,
    #[error("scan cancelled")]
    Cancelled,
}

/// Lifecycle of the orchestrator: Idle -> Scanning -> Complete (-> Scanning on next start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    Idle,
    Scanning,
    Complete,
}

/// Upper bound accepted for [`ScanOptions::time_scale`].
pub const MAX_TIME_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOptions {
    /// Multiplier applied to the per-port pacing delay. `0.0` disables pacing.
    /// Values outside `0.0..=MAX_TIME_SCALE` are clamped; NaN disables pacing.
    pub time_scale: f64,
}

impl ScanOptions {
    fn effective_time_scale(&self) -> f64 {
        if self.time_scale.is_nan() {
            0.0
        } else {
            self.time_scale.clamp(0.0, MAX_TIME_SCALE)
        }
    }
}

/// Parse a `--time-scale` argument.
pub fn parse_time_scale(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !v.is_finite() || !(0.0..=MAX_TIME_SCALE).contains(&v) {
        return Err(format!("time scale must be between 0 and {MAX_TIME_SCALE}"));
    }
    Ok(v)
}

/// Sleep between two port checks: the estimated duration spread evenly over the ports.
fn pacing_delay(estimated: Duration, total: usize, options: ScanOptions) -> Duration {
    let scale = options.effective_time_scale();
    if total == 0 || scale == 0.0 {
        return Duration::ZERO;
    }
    let scaled =
        Duration::try_from_secs_f64(estimated.as_secs_f64() * scale).unwrap_or(Duration::ZERO);
    scaled / u32::try_from(total).unwrap_or(u32::MAX)
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { time_scale: 1.0 }
    }
}

/// Lock-free progress counters readable while a scan runs.
#[derive(Clone, Debug, Default)]
pub struct SharedProgress {
    pub current_port: Arc<AtomicU64>,
    pub scanned: Arc<AtomicU64>,
    pub total: Arc<AtomicU64>,
    pub open: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub current_port: u64,
    pub scanned: u64,
    pub total: u64,
    pub open: u64,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&self, total: u64) {
        self.current_port.store(0, Ordering::Relaxed);
        self.scanned.store(0, Ordering::Relaxed);
        self.open.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current_port: self.current_port.load(Ordering::Relaxed),
            scanned: self.scanned.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            open: self.open.load(Ordering::Relaxed),
        }
    }
}

/// A validated scan request that holds the orchestrator in the Scanning phase.
///
/// Obtained from [`Orchestrator::begin`] and consumed by [`Orchestrator::execute`].
/// Dropping it unexecuted returns the orchestrator to Idle.
#[must_use = "a ticket keeps the orchestrator busy until it is executed or dropped"]
#[derive(Debug)]
pub struct ScanTicket {
    id: u64,
    target: String,
    scan_type: ScanType,
    plan: ScanPlan,
    estimated: Duration,
    guard: PhaseGuard,
}

impl ScanTicket {
    /// Sequence number of this scan, unique per orchestrator.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    pub fn total_ports(&self) -> usize {
        self.plan.ports.len()
    }

    pub fn estimated_duration(&self) -> Duration {
        self.estimated
    }
}

/// Sequences port checks for one scan at a time and records completed scans
/// in its history store.
pub struct Orchestrator<H> {
    history: Mutex<H>,
    run: Arc<Mutex<RunState>>,
    progress: SharedProgress,
    options: ScanOptions,
}

/// Phase and last report change together under one lock.
#[derive(Debug)]
struct RunState {
    phase: ScanPhase,
    report: Option<ScanReport>,
    last_id: u64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Puts the phase back to Idle if a scan is abandoned before completing.
#[derive(Debug)]
struct PhaseGuard {
    run: Arc<Mutex<RunState>>,
    armed: bool,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.run).phase = ScanPhase::Idle;
        }
    }
}

impl<H: HistoryStore> Orchestrator<H> {
    pub fn new(history: H, options: ScanOptions) -> Self {
        Self {
            history: Mutex::new(history),
            run: Arc::new(Mutex::new(RunState {
                phase: ScanPhase::Idle,
                report: None,
                last_id: 0,
            })),
            progress: SharedProgress::new(),
            options,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        lock(&self.run).phase
    }

    /// Report of the most recent completed scan, cleared when a new scan begins.
    pub fn last_report(&self) -> Option<ScanReport> {
        lock(&self.run).report.clone()
    }

    pub fn progress(&self) -> &SharedProgress {
        &self.progress
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.history).load()
    }

    pub fn clear_history(&self) -> Result<(), HistoryError> {
        lock(&self.history).clear()?;
        info!("scan history cleared");
        Ok(())
    }

    /// Validate `target` and move to Scanning.
    ///
    /// Fails without changing phase when the target is invalid or another scan is running.
    pub fn begin(&self, target: &str, scan_type: ScanType) -> Result<ScanTicket, ScanError> {
        let mut run = lock(&self.run);
        if run.phase == ScanPhase::Scanning {
            return Err(ScanError::Busy);
        }
        validate::validate(target)?;

        let plan = simulator::plan(target, scan_type);
        let estimated = ports::estimated_duration(scan_type);
        self.progress.reset(plan.ports.len() as u64);
        run.phase = ScanPhase::Scanning;
        run.report = None;
        run.last_id += 1;
        let id = run.last_id;
        info!(
            scan_id = id,
            host = %target,
            scan_type = %scan_type,
            class = ?plan.class,
            ports = plan.ports.len(),
            "scan started"
        );
        Ok(ScanTicket {
            id,
            target: target.to_string(),
            scan_type,
            plan,
            estimated,
            guard: PhaseGuard {
                run: Arc::clone(&self.run),
                armed: true,
            },
        })
    }

    /// Check every port of the ticket in order, pacing between ports, and
    /// return the completed report.
    ///
    /// `cancel` is checked before each port and during each pacing delay; a
    /// cancelled scan leaves no history entry and returns the phase to Idle.
    /// The report is readable through [`Orchestrator::last_report`] as soon as
    /// the phase reads Complete.
    pub async fn execute<R, F>(
        &self,
        ticket: ScanTicket,
        rng: &mut R,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<ScanReport, ScanError>
    where
        R: Rng + ?Sized,
        F: FnMut(&ScanEvent),
    {
        let ScanTicket {
            id: _,
            target,
            scan_type,
            plan,
            estimated,
            mut guard,
        } = ticket;
        let total = plan.ports.len();
        let estimated_secs = estimated.as_secs_f64();
        let delay = pacing_delay(estimated, total, self.options);

        on_event(&ScanEvent::Started {
            target: target.clone(),
            scan_type,
            total_ports: total,
            estimated_duration: estimated_secs,
        });

        let start = Instant::now();
        let mut results = Vec::with_capacity(total);
        for (index, &port) in plan.ports.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(host = %target, scanned = index, "scan cancelled");
                return Err(ScanError::Cancelled);
            }

            let open = plan.is_open(port, rng);
            let result = simulator::build_result(port, open, &target, rng);
            debug!(port, status = %result.status, "port checked");

            self.progress
                .current_port
                .store(u64::from(port), Ordering::Relaxed);
            self.progress.scanned.fetch_add(1, Ordering::Relaxed);
            if result.status == PortStatus::Open {
                self.progress.open.fetch_add(1, Ordering::Relaxed);
            }
            results.push(result);
            on_event(&ScanEvent::Progress(Progress::new(
                port,
                index,
                total,
                estimated_secs,
            )));

            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(host = %target, scanned = index + 1, "scan cancelled");
                        return Err(ScanError::Cancelled);
                    }
                    _ = time::sleep(delay) => {}
                }
            }
        }

        let duration = (start.elapsed().as_millis() as f64 / 1000.0).round() as u64;
        let report = ScanReport {
            target,
            scan_type,
            scan_date: now_rfc3339(),
            duration,
            results,
        };
        {
            let mut run = lock(&self.run);
            run.report = Some(report.clone());
            run.phase = ScanPhase::Complete;
            guard.armed = false;
        }
        info!(
            host = %report.target,
            open = report.open_count(),
            total = report.results.len(),
            duration_s = duration,
            "scan complete"
        );
        on_event(&ScanEvent::Complete(report.clone()));
        self.record(&report, scan_type);
        Ok(report)
    }

    /// Validate, then run the whole scan.
    pub async fn run<R, F>(
        &self,
        target: &str,
        scan_type: ScanType,
        rng: &mut R,
        cancel: &CancellationToken,
        on_event: F,
    ) -> Result<ScanReport, ScanError>
    where
        R: Rng + ?Sized,
        F: FnMut(&ScanEvent),
    {
        let ticket = self.begin(target, scan_type)?;
        self.execute(ticket, rng, cancel, on_event).await
    }

    fn record(&self, report: &ScanReport, scan_type: ScanType) {
        let mut store = lock(&self.history);
        let entry = history::entry_for_report(report, scan_type, now_millis(), &store.load());
        if let Err(e) = store.append(entry) {
            warn!(error = %e, "failed to persist scan history");
        }
    }
}

/// RFC 3339 UTC timestamp.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
}
