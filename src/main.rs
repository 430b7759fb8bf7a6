use std::fs;
use std::io::Write;
use std::path::PathBuf;

use portscan_sim::export::ExportFormat;
use portscan_sim::history::{JsonFileHistory, DEFAULT_HISTORY_FILE};
use portscan_sim::results::{ResultQuery, ResultStats, SortDirection, SortField, StatusFilter};
use portscan_sim::scanner::{self, Orchestrator, ScanOptions};
use portscan_sim::server::{self, AppState, SharedHistory};
use portscan_sim::types::{ScanEvent, ScanReport, ScanResult, ScanType};
use portscan_sim::{ports, validate};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Educational port scan simulator. Never opens a real socket.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portscan-sim",
    version,
    about = "Educational port scan simulator with a port knowledge base and a tiny embedded web UI.",
    long_about = None
)]
struct Cli {
    /// JSON file holding the ten most recent scans.
    #[arg(long = "history-file", global = true, default_value = DEFAULT_HISTORY_FILE)]
    history_file: PathBuf,

    /// Multiplier applied to scan pacing, 0 to 100 (0 disables pacing).
    #[arg(long = "time-scale", global = true, default_value_t = 1.0, value_parser = scanner::parse_time_scale)]
    time_scale: f64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run a simulated scan against a target.
    Scan {
        /// IPv4 address or domain name.
        target: String,

        /// Port preset.
        #[arg(long = "type", value_enum, default_value_t = ScanType::Quick)]
        scan_type: ScanType,

        /// Only show results with this status.
        #[arg(long, value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,

        /// Filter by port number, service or description.
        #[arg(long)]
        search: Option<String>,

        /// Sort column.
        #[arg(long, value_enum, default_value_t = SortField::Port)]
        sort: SortField,

        /// Sort descending.
        #[arg(long, default_value_t = false)]
        desc: bool,

        /// Export the report in this format.
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,

        /// Export destination (defaults to port-scan-<target>-<millis>.<ext>).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Seed for reproducible outcomes.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Start the embedded HTTP UI server.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,

        /// Directory holding the static UI.
        #[arg(long = "ui-dir", default_value = "ui")]
        ui_dir: PathBuf,
    },

    /// Show or clear the scan history.
    History {
        #[arg(long, default_value_t = false)]
        clear: bool,
    },

    /// Show the knowledge base, or a single port's entry.
    Ports { port: Option<u16> },

    /// Check whether a target is syntactically valid.
    Validate { target: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();

    let options = ScanOptions {
        time_scale: cli.time_scale,
    };

    match cli.command {
        Command::Scan {
            target,
            scan_type,
            status,
            search,
            sort,
            desc,
            export,
            output,
            seed,
        } => {
            let orchestrator =
                Orchestrator::new(JsonFileHistory::open(&cli.history_file), options);
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };

            // Ctrl-C cancels the scan.
            let cancel = CancellationToken::new();
            let cancel_ctrlc = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                cancel_ctrlc.cancel();
            });

            let report = orchestrator
                .run(&target, scan_type, &mut rng, &cancel, print_event)
                .await?;

            let query = ResultQuery {
                status,
                search: search.unwrap_or_default(),
                sort,
                direction: if desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
            };
            print_results_table(&report, &query.apply(&report.results));

            if let Some(format) = export {
                let path = output.unwrap_or_else(|| {
                    PathBuf::from(format.file_name(&report.target, scanner::now_millis()))
                });
                write_export(&path, format, &report)?;
                println!("Wrote {} report to {}", format.extension(), path.display());
            }
        }
        Command::Serve { bind, ui_dir } => {
            let history: SharedHistory = Box::new(JsonFileHistory::open(&cli.history_file));
            let state = AppState::new(Orchestrator::new(history, options));
            info!(history = %cli.history_file.display(), "starting UI server");
            tokio::select! {
                res = server::spawn_server(&bind, state, &ui_dir) => res?,
                _ = tokio::signal::ctrl_c() => info!("shutting down"),
            }
        }
        Command::History { clear } => {
            let orchestrator =
                Orchestrator::new(JsonFileHistory::open(&cli.history_file), options);
            if clear {
                orchestrator.clear_history()?;
                println!("Scan history cleared.");
            } else {
                print_history(&orchestrator);
            }
        }
        Command::Ports { port } => match port {
            Some(p) => {
                let info = ports::lookup(p);
                println!("{}", serde_json::to_string_pretty(&info)?);
                if !ports::is_known(p) {
                    eprintln!("Port {p} is not in the knowledge base.");
                }
            }
            None => {
                println!("{:>5}  {:<10}  {:<6}  description", "port", "service", "risk");
                for info in ports::known_ports() {
                    println!(
                        "{:>5}  {:<10}  {:<6}  {}",
                        info.port, info.service, info.risk, info.description
                    );
                }
            }
        },
        Command::Validate { target } => {
            let v: validate::Validation = validate::validate(&target).into();
            println!("{}", serde_json::to_string_pretty(&v)?);
            if !v.valid {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn print_event(ev: &ScanEvent) {
    match ev {
        ScanEvent::Started {
            target,
            scan_type,
            total_ports,
            estimated_duration,
        } => {
            println!(
                "Scanning {target} ({scan_type}, {total_ports} ports, ~{estimated_duration:.0}s)..."
            );
        }
        ScanEvent::Progress(p) => {
            let mut err = std::io::stderr();
            let _ = write!(
                err,
                "\r[{:>3.0}%] port {:>5} ({}/{})  {:.0}s remaining   ",
                p.percent_complete,
                p.current_port,
                p.index + 1,
                p.total_ports,
                p.estimated_remaining_time
            );
            let _ = err.flush();
        }
        ScanEvent::Complete(_) => eprintln!(),
    }
}

fn print_results_table(report: &ScanReport, rows: &[&ScanResult]) {
    let stats = ResultStats::from_results(&report.results);
    println!(
        "\nTarget: {}  duration: {}s  total: {}  open: {}  closed: {}  filtered: {}",
        report.target, report.duration, stats.total, stats.open, stats.closed, stats.filtered
    );

    let mut service_w = "service".len();
    for r in rows {
        service_w = service_w.max(r.service.len());
    }
    let port_w = 5usize;
    let status_w = "filtered".len();
    let risk_w = "medium".len();

    println!(
        "{:>port_w$}  {:<status_w$}  {:<service_w$}  {:<risk_w$}",
        "port",
        "status",
        "service",
        "risk",
    );
    println!(
        "{:-<port_w$}  {:-<status_w$}  {:-<service_w$}  {:-<risk_w$}",
        "", "", "", "",
    );
    for r in rows {
        println!(
            "{:>port_w$}  {:<status_w$}  {:<service_w$}  {:<risk_w$}",
            r.port,
            r.status.as_str(),
            r.service,
            r.risk.as_str(),
        );
    }
    if rows.is_empty() {
        println!("No results found matching your filters");
    }
}

fn print_history(orchestrator: &Orchestrator<JsonFileHistory>) {
    let entries = orchestrator.history();
    if entries.is_empty() {
        println!("No scan history.");
        return;
    }
    println!(
        "{:<15}  {:<24}  {:<8}  {:>9}",
        "id", "target", "type", "open/total"
    );
    for e in entries {
        println!(
            "{:<15}  {:<24}  {:<8}  {:>4}/{:<5}",
            e.id, e.target, e.scan_type, e.open_ports, e.total_ports
        );
    }
}

fn write_export(path: &std::path::Path, format: ExportFormat, report: &ScanReport) -> Result<()> {
    let body = format.render(report)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
