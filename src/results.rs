//! Filtering, searching, sorting and paging over a scan's result set.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{PortStatus, ScanResult};

pub const DEFAULT_PER_PAGE: usize = 25;

/// Counts per status.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultStats {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    pub filtered: usize,
}

impl ResultStats {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let mut stats = ResultStats {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                PortStatus::Open => stats.open += 1,
                PortStatus::Closed => stats.closed += 1,
                PortStatus::Filtered => stats.filtered += 1,
            }
        }
        stats
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Open,
    Closed,
    Filtered,
}

impl StatusFilter {
    fn admits(self, status: PortStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Open => status == PortStatus::Open,
            StatusFilter::Closed => status == PortStatus::Closed,
            StatusFilter::Filtered => status == PortStatus::Filtered,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Port,
    Status,
    Risk,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// View options for a result table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ResultQuery {
    pub status: StatusFilter,
    /// Matched against the port number text, service and description.
    #[serde(rename = "q")]
    pub search: String,
    pub sort: SortField,
    #[serde(rename = "dir")]
    pub direction: SortDirection,
}

impl ResultQuery {
    /// Clicking the current sort column flips direction; a new column starts ascending.
    pub fn toggle_sort(&mut self, field: SortField) {
        if self.sort == field {
            self.direction = self.direction.toggled();
        } else {
            self.sort = field;
            self.direction = SortDirection::Asc;
        }
    }

    fn matches(&self, r: &ScanResult) -> bool {
        if !self.status.admits(r.status) {
            return false;
        }
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        r.port.to_string().contains(&self.search)
            || r.service.to_lowercase().contains(&needle)
            || r.description.to_lowercase().contains(&needle)
    }

    fn compare(&self, a: &ScanResult, b: &ScanResult) -> Ordering {
        let ord = match self.sort {
            SortField::Port => a.port.cmp(&b.port),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::Risk => a.risk.rank().cmp(&b.risk.rank()),
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }

    /// Filtered and sorted view; the sort is stable.
    pub fn apply<'a>(&self, results: &'a [ScanResult]) -> Vec<&'a ScanResult> {
        let mut out: Vec<&ScanResult> = results.iter().filter(|r| self.matches(r)).collect();
        out.sort_by(|a, b| self.compare(a, b));
        out
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Slice `items` into 1-based pages. Out-of-range pages clamp to the last page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_items);
    Page {
        items: items[start.min(end)..end].to_vec(),
        page,
        per_page,
        total_items,
        total_pages,
    }
}
