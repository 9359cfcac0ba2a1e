//! CLI command dispatch
//!
//! Runs one command against loaded settings and maps the outcome to an exit
//! code.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use flowlens_api::ApiServer;
use flowlens_core::provenance::{LifecycleError, LifecycleManager, QueryCriteria};
use flowlens_core::{LokiClient, NifiClient, Settings};

use crate::cli::{
    Command, Error, LineageArgs, Result, EXIT_FAILURE, EXIT_SUCCESS, EXIT_TIMED_OUT,
};

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run `command` and return the process exit code
pub async fn run_command(command: Command, mut settings: Settings) -> ExitCode {
    let result = match command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.api_host = host;
            }
            if let Some(port) = port {
                settings.api_port = port;
            }
            serve(&settings).await
        }
        Command::Lineage(args) => lineage(&settings, args).await,
        Command::Logs {
            processor_id,
            limit,
        } => logs(&settings, &processor_id, limit).await,
        Command::Health => health(&settings).await,
    };

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    }
}

/// Exit code for a failed command
pub fn exit_code(err: &Error) -> ExitCode {
    match err {
        Error::Lifecycle(LifecycleError::TimedOut { .. }) => EXIT_TIMED_OUT,
        _ => EXIT_FAILURE,
    }
}

async fn serve(settings: &Settings) -> Result<()> {
    ApiServer::from_settings(settings)
        .start()
        .await
        .map_err(|e| Error::Server(e.to_string()))
}

async fn lineage(settings: &Settings, args: LineageArgs) -> Result<()> {
    let criteria = QueryCriteria::for_flow_file(args.flow_file_uuid)
        .with_max_results(args.max_results)
        .with_window(args.start, args.end)
        .with_summarize(args.summarize);
    let manager =
        LifecycleManager::new(NifiClient::from_settings(settings), settings.poll_policy());

    // Ctrl-C ends polling early; the remote query is still deleted.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling lineage query");
            on_interrupt.cancel();
        }
    });

    let result = manager.run_event_query_with_cancel(&criteria, &cancel).await;
    interrupt.abort();

    let result = result?;
    info!(
        events = result.events.len(),
        skipped = result.skipped,
        "lineage query complete"
    );
    print_json(&result)
}

async fn logs(settings: &Settings, processor_id: &str, limit: u32) -> Result<()> {
    let entries = LokiClient::from_settings(settings)
        .processor_logs(processor_id, None, None, limit.max(1))
        .await?;
    print_json(&entries)
}

async fn health(settings: &Settings) -> Result<()> {
    let nifi = NifiClient::from_settings(settings);
    let probe = nifi.health_check().await;
    if probe.is_available() {
        println!("NiFi API at {} is accessible", nifi.base_url());
        Ok(())
    } else {
        Err(Error::Unavailable(format!("{:?}", probe)))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        let timed_out = Error::Lifecycle(LifecycleError::TimedOut {
            handle: "q".to_string(),
            attempts: 120,
            elapsed: Duration::from_secs(119),
        });
        assert_eq!(exit_code(&timed_out), EXIT_TIMED_OUT);
        assert_eq!(exit_code(&Error::Server("bind".to_string())), EXIT_FAILURE);
    }
}
