use crate::catalog::{self, Metric};
use crate::chart::ChartWindow;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB: &str = "nodestats.db";

#[derive(Parser, Debug)]
#[command(name = "nodestats")]
#[command(about = "Terminal dashboard for per-node capture cluster statistics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Logging verbosity (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive stats dashboard (default)
    View(ViewArgs),

    /// Print one page of node stats with totals and averages
    Snapshot {
        /// Stats database file
        #[arg(default_value = DEFAULT_DB)]
        file: PathBuf,

        /// Rows per page
        #[arg(long, short = 'n', default_value = "10")]
        length: usize,

        /// Row offset of the first row
        #[arg(long, default_value = "0")]
        start: usize,

        /// Sort key (nodeName, cpu, deltaPackets, ...)
        #[arg(long, short = 's', default_value = "nodeName")]
        sort: String,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Only nodes whose name contains this text
        #[arg(long, short = 'f')]
        filter: Option<String>,

        /// Output as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,

        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },

    /// Write synthetic node stats into a database
    Simulate {
        /// Stats database file
        #[arg(default_value = DEFAULT_DB)]
        file: PathBuf,

        /// Number of nodes to simulate
        #[arg(long, default_value = "4")]
        nodes: usize,

        /// Time between samples
        #[arg(long, short = 'i', default_value = "1s", value_parser = parse_duration)]
        interval: Duration,

        /// Stop after this long (default: until Ctrl-C)
        #[arg(long, short = 'd', value_parser = parse_duration)]
        duration: Option<Duration>,

        /// Pre-fill this much history before going live
        #[arg(long, value_parser = parse_duration)]
        backfill: Option<Duration>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Stats database file
    pub file: Option<PathBuf>,

    /// User settings YAML (timezone, palette)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Table refresh interval (0 pauses)
    #[arg(long, short = 'r', default_value = "5s", value_parser = parse_duration)]
    pub refresh: Duration,

    /// Rows per page
    #[arg(long, short = 'n', default_value = "10")]
    pub length: usize,

    /// Metric shown in the cluster chart
    #[arg(long, short = 'm', default_value = "deltaPacketsPerSec", value_parser = parse_metric)]
    pub metric: Metric,

    /// Chart window: step seconds (0, 1, 5, 60, 600) or 24m, 2h, 1d, 10d
    #[arg(long, short = 'w', default_value = "5", value_parser = parse_window)]
    pub window: ChartWindow,
}

impl Default for ViewArgs {
    fn default() -> Self {
        ViewArgs {
            file: None,
            settings: None,
            refresh: Duration::from_secs(5),
            length: 10,
            metric: Metric::PacketsPerSec,
            window: ChartWindow::Hours2,
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    // Try humantime first
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }

    // Try bare number as seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    Err(format!(
        "Invalid duration '{}'. Examples: 30s, 5m, 2h, 1h30m, 90",
        s
    ))
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    Metric::from_field(s).ok_or_else(|| {
        let fields: Vec<&str> = catalog::chartable_metrics().iter().map(|m| m.field()).collect();
        format!("Unknown metric '{}'. Choose one of: {}", s, fields.join(", "))
    })
}

fn parse_window(s: &str) -> Result<ChartWindow, String> {
    ChartWindow::parse(s).ok_or_else(|| {
        format!("Invalid window '{}'. Examples: 0, 1, 5, 60, 600, 2h, 1d", s)
    })
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Some(Command::View(args)) if args.length == 0 => {
                Err("Page length must be at least 1".to_string())
            }
            Some(Command::Snapshot { length: 0, .. }) => {
                Err("Page length must be at least 1".to_string())
            }
            Some(Command::Snapshot { sort, .. }) if catalog::column_by_sort_key(sort).is_none() => {
                Err(format!("Unknown sort key '{}'", sort))
            }
            Some(Command::Simulate { nodes: 0, .. }) => {
                Err("At least one node is required".to_string())
            }
            Some(Command::Simulate { interval, .. }) if interval.is_zero() => {
                Err("Sample interval must be positive".to_string())
            }
            _ => Ok(()),
        }
    }
}
