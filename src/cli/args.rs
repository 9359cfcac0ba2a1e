//! CLI argument parsing
//!
//! ```text
//! flowlens [--config FILE] [--log-level LEVEL] [--log-json] <command>
//!
//! COMMANDS:
//!   serve                  Run the HTTP API (default)
//!   lineage <uuid>         Run one provenance query and print it as JSON
//!   logs <processor-id>    Print recent log entries of one processor
//!   health                 Probe the NiFi API
//! ```

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};

/// Parsed CLI arguments
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "flowlens", version, about = "NiFi lineage and log telemetry service")]
pub struct Args {
    /// Settings file (TOML or JSON); defaults to the user config directory
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI commands
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one provenance query and print the result as JSON
    Lineage(LineageArgs),

    /// Print recent log entries of one processor
    Logs {
        processor_id: String,
        #[arg(long, default_value_t = flowlens_core::logs::DEFAULT_LOG_LIMIT)]
        limit: u32,
    },

    /// Probe the NiFi API
    Health,
}

#[derive(Debug, Clone, PartialEq, ClapArgs)]
pub struct LineageArgs {
    /// FlowFile UUID to trace
    pub flow_file_uuid: String,

    #[arg(long, default_value_t = flowlens_core::provenance::DEFAULT_MAX_RESULTS)]
    pub max_results: u32,

    /// Window start (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    #[arg(long)]
    pub summarize: bool,
}

impl Args {
    /// Command to run; `serve` when none was given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            host: None,
            port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_default_command_is_serve() {
        let args = parse(&["flowlens"]);
        assert_eq!(
            args.command(),
            Command::Serve {
                host: None,
                port: None
            }
        );
        assert!(!args.log_json);
    }

    #[test]
    fn test_lineage_arguments() {
        let args = parse(&[
            "flowlens",
            "lineage",
            "ff-1",
            "--max-results",
            "10",
            "--start",
            "2024-05-01T00:00:00Z",
            "--log-json",
        ]);
        match args.command() {
            Command::Lineage(lineage) => {
                assert_eq!(lineage.flow_file_uuid, "ff-1");
                assert_eq!(lineage.max_results, 10);
                assert!(lineage.start.is_some());
                assert!(lineage.end.is_none());
                assert!(!lineage.summarize);
            }
            other => panic!("expected lineage, got {:?}", other),
        }
        assert!(args.log_json);
    }

    #[test]
    fn test_global_config_flag() {
        let args = parse(&["flowlens", "health", "--config", "/etc/flowlens.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/flowlens.toml")));
        assert_eq!(args.command(), Command::Health);
    }

    #[test]
    fn test_missing_lineage_uuid_rejected() {
        assert!(Args::try_parse_from(["flowlens", "lineage"]).is_err());
    }
}
