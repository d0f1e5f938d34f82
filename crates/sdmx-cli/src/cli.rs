//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use sdmx_model::parse_date_bound;

#[derive(Parser)]
#[command(
    name = "sdmx-present",
    version,
    about = "Browse SDMX dataflows and render their presentation tables",
    long_about = "Browse the dataflows of an SDMX service and render hierarchical\n\
                  presentation tables built from their observations.\n\n\
                  Use --offline with a JSON fixture to work without network access."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub service: ServiceArgs,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

/// Where data comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Answer from a JSON fixture instead of the remote service.
    #[arg(long = "offline", value_name = "FIXTURE", global = true)]
    pub offline: Option<PathBuf>,

    /// Service configuration file (TOML).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Service root URL (overrides the configuration file and SDMX_BASE_URL).
    #[arg(long = "base-url", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long = "timeout", value_name = "SECS", global = true)]
    pub timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List dataflows, optionally matching a search query.
    Dataflows(DataflowsArgs),

    /// List the presentation tables of a dataflow.
    Tables(TablesArgs),

    /// Show the legal values of a dimension given prior selections.
    Options(OptionsArgs),

    /// Build a presentation table.
    Table(Box<TableArgs>),
}

#[derive(Parser)]
pub struct DataflowsArgs {
    /// Search query: words are ANDed, `|` separates alternatives, quotes keep phrases.
    #[arg(long = "search", value_name = "QUERY")]
    pub search: Option<String>,

    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct TablesArgs {
    #[arg(value_name = "DATAFLOW")]
    pub dataflow: String,

    /// Keep only tables with at least one indicator the service has data for.
    #[arg(long = "available")]
    pub available: bool,

    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct OptionsArgs {
    #[arg(value_name = "DATAFLOW")]
    pub dataflow: String,

    /// Dimension (or `country` / `indicator`) to list values for.
    #[arg(value_name = "DIMENSION")]
    pub dimension: String,

    /// Prior selection; repeat for several dimensions.
    #[arg(long = "select", value_name = "DIM=VALUE", value_parser = parse_key_value)]
    pub select: Vec<(String, String)>,

    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct TableArgs {
    #[arg(value_name = "DATAFLOW")]
    pub dataflow: String,

    /// Table id, `DATAFLOW::TABLE` or `TABLE:TOPCODE` (default: the only table).
    #[arg(long = "table", value_name = "ID")]
    pub table: Option<String>,

    /// Dimension filter; values may be separated by `,` or `+`.
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,

    /// First period (YYYY, YYYY-MM, YYYY-MM-DD or YYYY-Qn).
    #[arg(long = "start", value_name = "PERIOD", value_parser = parse_period)]
    pub start: Option<String>,

    /// Last period (YYYY, YYYY-MM, YYYY-MM-DD or YYYY-Qn).
    #[arg(long = "end", value_name = "PERIOD", value_parser = parse_period)]
    pub end: Option<String>,

    /// Keep only the last N periods.
    #[arg(long = "limit", value_name = "N")]
    pub limit: Option<u32>,

    /// Keep only entries at this depth of the hierarchy.
    #[arg(long = "depth", value_name = "N")]
    pub depth: Option<u32>,

    /// Keep only direct children of this entry.
    #[arg(long = "parent", value_name = "CODE")]
    pub parent: Option<String>,

    /// Keep only these indicator codes; repeat or separate with `,`.
    #[arg(long = "indicator", value_name = "CODE", value_delimiter = ',')]
    pub indicators: Vec<String>,

    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,

    /// Print the matched rows instead of the pivoted matrix.
    #[arg(long = "raw")]
    pub raw: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    Table,
    Csv,
    Json,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{value}'")),
    }
}

fn parse_period(value: &str) -> Result<String, String> {
    parse_date_bound(value)
        .map(|_| value.trim().to_string())
        .ok_or_else(|| {
            format!("invalid period '{value}', expected YYYY, YYYY-MM, YYYY-MM-DD or YYYY-Qn")
        })
}
