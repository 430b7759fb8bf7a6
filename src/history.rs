//! Scan history: the ten most recent completed scans, newest first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::{HistoryEntry, ScanReport, ScanType};

/// Maximum number of entries kept.
pub const HISTORY_LIMIT: usize = 10;

/// Default file name of the persisted history slot.
pub const DEFAULT_HISTORY_FILE: &str = "scanHistory.json";

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] io::Error),
    #[error("history serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Narrow storage interface the orchestrator depends on.
pub trait HistoryStore {
    /// Current entries, newest first.
    fn load(&self) -> Vec<HistoryEntry>;

    /// Push `entry` to the front, truncate to [`HISTORY_LIMIT`] and return the new list.
    fn append(&mut self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>, HistoryError>;

    fn clear(&mut self) -> Result<(), HistoryError>;
}

impl<H: HistoryStore + ?Sized> HistoryStore for Box<H> {
    fn load(&self) -> Vec<HistoryEntry> {
        (**self).load()
    }

    fn append(&mut self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>, HistoryError> {
        (**self).append(entry)
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        (**self).clear()
    }
}

fn push_front(list: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    list.insert(0, entry);
    list.truncate(HISTORY_LIMIT);
}

/// Build the history entry for a completed scan.
///
/// The id is the epoch-millis timestamp, bumped past any id already in `existing`.
pub fn entry_for_report(
    report: &ScanReport,
    scan_type: ScanType,
    now_millis: u64,
    existing: &[HistoryEntry],
) -> HistoryEntry {
    let mut id_millis = now_millis;
    while existing.iter().any(|e| e.id == id_millis.to_string()) {
        id_millis += 1;
    }
    HistoryEntry {
        id: id_millis.to_string(),
        target: report.target.clone(),
        timestamp: now_millis,
        open_ports: report.open_count(),
        total_ports: report.results.len(),
        scan_type: scan_type.label().to_string(),
    }
}

/// In-process history, lost on exit.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    entries: Vec<HistoryEntry>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn load(&self) -> Vec<HistoryEntry> {
        self.entries.clone()
    }

    fn append(&mut self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>, HistoryError> {
        push_front(&mut self.entries, entry);
        Ok(self.entries.clone())
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        self.entries.clear();
        Ok(())
    }
}

/// History persisted as a single JSON file, fully rewritten on every change.
///
/// The file is read once when the store is opened. Missing or malformed
/// content is treated as an empty history.
#[derive(Debug)]
pub struct JsonFileHistory {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl JsonFileHistory {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "loaded scan history");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), HistoryError> {
        let json = serde_json::to_vec(&self.entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Vec<HistoryEntry> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable scan history, starting empty");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
        Ok(mut entries) => {
            entries.truncate(HISTORY_LIMIT);
            entries
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed scan history, starting empty");
            Vec::new()
        }
    }
}

impl HistoryStore for JsonFileHistory {
    fn load(&self) -> Vec<HistoryEntry> {
        self.entries.clone()
    }

    fn append(&mut self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>, HistoryError> {
        push_front(&mut self.entries, entry);
        self.persist()?;
        Ok(self.entries.clone())
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        self.entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
