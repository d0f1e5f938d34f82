//! SDMX presentation CLI.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use sdmx_cli::cli::{Cli, LogFormatArg, LogLevelArg};
use sdmx_cli::commands::execute;
use sdmx_cli::logging::{LogConfig, LogFormat, init_logging};
use sdmx_cli::session::Session;
use sdmx_model::Warning;
use tracing::level_filters::LevelFilter;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let result = Session::open(&cli.service)
        .and_then(|session| execute(&cli.command, &session, &mut io::stdout().lock()));
    let exit_code = match result {
        Ok(warnings) => {
            print_warnings(&warnings);
            0
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

/// Each warning is already logged when recorded; only the count is repeated.
fn print_warnings(warnings: &[Warning]) {
    match warnings.len() {
        0 => {}
        1 => eprintln!("completed with 1 warning"),
        count => eprintln!("completed with {count} warnings"),
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
