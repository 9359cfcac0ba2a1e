//! CLI module
//!
//! Provides:
//! - Argument parsing (clap)
//! - Logging and settings bootstrap
//! - Command dispatch (serve, lineage, logs, health)

pub mod args;
pub mod bootstrap;
pub mod dispatch;

// Re-exports
pub use args::{Args, Command, LineageArgs};
pub use bootstrap::{init_logging, load_settings, resolve_config_path};
pub use dispatch::{exit_code, run_command, ExitCode};

use flowlens_core::logs::LogQueryError;
use flowlens_core::provenance::LifecycleError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("{0}")]
    Logs(#[from] LogQueryError),

    #[error("NiFi API unavailable: {0}")]
    Unavailable(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;
pub const EXIT_TIMED_OUT: i32 = 3;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
