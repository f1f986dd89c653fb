//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// eventpipe - buffered, deduplicating event delivery with a stuck-UI watchdog
#[derive(Parser, Debug)]
#[command(
    name = "eventpipe",
    author,
    version,
    about = "Buffered analytics event delivery pipeline",
    long_about = "Replays a scripted session through the event pipeline.\n\n\
                  Events are deduplicated, buffered until the configured sinks \n\
                  finish starting, then flushed in order and fanned out."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVENTPIPE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVENTPIPE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines session script through the pipeline
    Replay(ReplayArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "EVENTPIPE_CONFIG"
    )]
    pub config: PathBuf,

    /// Session script, one JSON entry per line
    #[arg(short, long, env = "EVENTPIPE_EVENTS")]
    pub events: PathBuf,

    /// Delay before sinks are started, to exercise buffering
    #[arg(long, default_value = "0", env = "EVENTPIPE_SETUP_DELAY_MS")]
    pub setup_delay_ms: u64,

    /// Application id reported to sinks
    #[arg(long, default_value = "eventpipe", env = "EVENTPIPE_APP_ID")]
    pub app_id: String,

    /// Application version reported to sinks
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"), env = "EVENTPIPE_APP_VERSION")]
    pub app_version: String,

    /// Print every delivered event
    #[arg(long)]
    pub print_events: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "EVENTPIPE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replay_args() {
        let cli = Cli::try_parse_from([
            "eventpipe",
            "-v",
            "replay",
            "--config",
            "c.toml",
            "--events",
            "session.jsonl",
            "--setup-delay-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.config, PathBuf::from("c.toml"));
                assert_eq!(args.events, PathBuf::from("session.jsonl"));
                assert_eq!(args.setup_delay_ms, 250);
                assert_eq!(args.metrics_port, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["eventpipe", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
