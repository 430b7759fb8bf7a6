//! Shared domain types for scans, results and history.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Qualitative exposure rating attached to a port's typical service.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    /// Sort rank used by the results view (high sorts last ascending).
    pub fn rank(self) -> u8 {
        match self {
            Risk::Low => 1,
            Risk::Medium => 2,
            Risk::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-port outcome of a simulated check.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
}

impl PortStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PortStatus::Open => "open",
            PortStatus::Closed => "closed",
            PortStatus::Filtered => "filtered",
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Named preset selecting which ports to check.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    Quick,
    Standard,
    Full,
}

impl ScanType {
    /// Upper-case label stored in history entries (`QUICK`, `STANDARD`, `FULL`).
    pub fn label(self) -> &'static str {
        match self {
            ScanType::Quick => "QUICK",
            ScanType::Standard => "STANDARD",
            ScanType::Full => "FULL",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanType::Quick => "quick",
            ScanType::Standard => "standard",
            ScanType::Full => "full",
        };
        f.pad(s)
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(ScanType::Quick),
            "standard" => Ok(ScanType::Standard),
            "full" => Ok(ScanType::Full),
            other => Err(format!("unknown scan type: {other}")),
        }
    }
}

/// Static knowledge base record for one port number.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub port: u16,
    pub service: String,
    pub description: String,
    pub risk: Risk,
    pub recommendation: String,
}

/// One simulated scan result entry for a port. Never mutated after creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub port: u16,
    pub status: PortStatus,
    pub service: String,
    pub description: String,
    pub risk: Risk,
    pub recommendation: String,
}

/// Summary of a completed scan kept in the history list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub target: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
    pub open_ports: usize,
    pub total_ports: usize,
    pub scan_type: String,
}

/// Progress update emitted after each port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_port: u16,
    /// Zero-based position of `current_port` in the scan's port list.
    pub index: usize,
    pub total_ports: usize,
    pub percent_complete: f64,
    /// Seconds, derived from the estimated duration and the percentage done.
    pub estimated_remaining_time: f64,
}

impl Progress {
    pub fn new(current_port: u16, index: usize, total_ports: usize, estimated_secs: f64) -> Self {
        let percent_complete = if total_ports == 0 {
            100.0
        } else {
            (index + 1) as f64 / total_ports as f64 * 100.0
        };
        let estimated_remaining_time =
            (estimated_secs - estimated_secs * percent_complete / 100.0).max(0.0);
        Self {
            current_port,
            index,
            total_ports,
            percent_complete,
            estimated_remaining_time,
        }
    }
}

/// Full result set of a completed scan; also the JSON export shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub target: String,
    #[serde(default)]
    pub scan_type: ScanType,
    /// RFC 3339 UTC timestamp.
    pub scan_date: String,
    /// Whole seconds.
    pub duration: u64,
    pub results: Vec<ScanResult>,
}

impl ScanReport {
    pub fn open_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == PortStatus::Open)
            .count()
    }
}

/// Events emitted by the orchestrator while a scan runs.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ScanEvent {
    Started {
        target: String,
        scan_type: ScanType,
        total_ports: usize,
        estimated_duration: f64,
    },
    Progress(Progress),
    Complete(ScanReport),
}
