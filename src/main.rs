//! FlowLens CLI
//!
//! Loads settings, installs logging, then runs one command (default: serve).

use clap::Parser;

use flowlens::cli::{init_logging, load_settings, run_command, Args, EXIT_CONFIG_ERROR};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let settings = match load_settings(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let level = args.log_level.as_deref().unwrap_or(&settings.log_level);
    if let Err(e) = init_logging(level, args.log_json) {
        eprintln!("Error: {:#}", e);
        std::process::exit(EXIT_CONFIG_ERROR);
    }

    let exit_code = run_command(args.command(), settings).await;
    std::process::exit(exit_code);
}
