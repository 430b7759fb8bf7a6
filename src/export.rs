//! Report exports: plain text, CSV and JSON.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::types::{ScanReport, ScanResult};

pub const CSV_HEADER: &str = "Port,Status,Service,Description,Risk,Recommendation";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Txt,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    /// `port-scan-<target>-<millis>.<ext>`
    pub fn file_name(self, target: &str, millis: u64) -> String {
        format!("port-scan-{target}-{millis}.{}", self.extension())
    }

    pub fn render(self, report: &ScanReport) -> Result<String> {
        match self {
            ExportFormat::Txt => Ok(to_text(report)),
            ExportFormat::Csv => to_csv(&report.results),
            ExportFormat::Json => to_json(report),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Txt),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Plain text report: header lines then a tab-separated port/status/service/risk table.
pub fn to_text(report: &ScanReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Port Scan Report");
    let _ = writeln!(out, "Target: {}", report.target);
    let _ = writeln!(out, "Date: {}", report.scan_date);
    let _ = writeln!(out, "Duration: {}s", report.duration);
    out.push('\n');
    out.push_str("Port\tStatus\tService\tRisk\n");
    out.push_str("----\t------\t-------\t----\n");
    for r in &report.results {
        let _ = writeln!(out, "{}\t{}\t{}\t{}", r.port, r.status, r.service, r.risk);
    }
    out
}

/// CSV with the port unquoted and every text field quoted.
pub fn to_csv(results: &[ScanResult]) -> Result<String> {
    let mut buf = format!("{CSV_HEADER}\n").into_bytes();
    {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::NonNumeric)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(&mut buf);
        for r in results {
            wtr.write_record([
                r.port.to_string().as_str(),
                r.status.as_str(),
                r.service.as_str(),
                r.description.as_str(),
                r.risk.as_str(),
                r.recommendation.as_str(),
            ])
            .context("failed to write CSV row")?;
        }
        wtr.flush().context("failed to flush CSV writer")?;
    }
    String::from_utf8(buf).context("CSV output is not UTF-8")
}

/// Pretty JSON `{target, scanDate, duration, results}`.
pub fn to_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize scan report")
}

pub fn from_json(s: &str) -> Result<ScanReport> {
    serde_json::from_str(s).context("failed to parse scan report JSON")
}
