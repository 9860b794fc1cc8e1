use crate::{
    error::CliError,
    output::{ParcelView, StatusView},
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use engine_config::{
    env::EnvManager,
    settings::{KEY_WORKER_ID, WorkerSettings},
};
use engine_core::{
    connectors::source::ScanSource,
    state::{CursorStore, ScanQueries, ScanStore},
};
use engine_runtime::{
    PollLoop,
    factory::{build_source, open_store},
};
use model::events::scan::ScanEventType;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Debug, Parser)]
#[command(name = "scantrack", version, about = "Parcel scan event ingestion worker")]
struct Cli {
    #[arg(long, global = true, help = "Load settings from this .env file")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn execute(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Commands::Run { worker_id } => {
            let settings = load_settings(cli.env_file.as_deref(), worker_id)?;
            run_worker(settings).await
        }
        Commands::Status { worker_id, json } => {
            let settings = load_settings(cli.env_file.as_deref(), worker_id)?;
            let store = open_store(&settings.store).await?;
            let view = StatusView {
                cursor: store.load_cursor(&settings.ingest.worker_id).await?,
                summary: store.summary().await?,
                worker_id: settings.ingest.worker_id,
            };
            if json {
                output::print_json(&view)?;
            } else {
                output::print_status(&view);
            }
            Ok(ExitCode::Success)
        }
        Commands::Parcel { id, json } => {
            let settings = load_settings(cli.env_file.as_deref(), None)?;
            let store = open_store(&settings.store).await?;
            let view = parcel_view(store.as_ref(), id).await?;
            if json {
                output::print_json(&view)?;
            } else {
                output::print_parcel(&view);
            }
            Ok(ExitCode::Success)
        }
        Commands::SetCursor {
            event_id,
            worker_id,
        } => {
            let settings = load_settings(cli.env_file.as_deref(), worker_id)?;
            let worker_id = settings.ingest.worker_id;
            let store = open_store(&settings.store).await?;

            let previous = store
                .load_cursor(&worker_id)
                .await?
                .map(|cursor| cursor.last_event_id);
            if previous.is_some_and(|previous| event_id < previous) {
                warn!(
                    worker_id = %worker_id,
                    previous,
                    event_id,
                    "Rewinding cursor; events after {event_id} will be fetched again."
                );
            }
            store.advance_cursor(&worker_id, event_id).await?;
            output::print_cursor_change(&worker_id, previous, event_id);
            Ok(ExitCode::Success)
        }
        Commands::TestConn { upstream } => {
            let settings = load_settings(cli.env_file.as_deref(), None)?;
            let store = open_store(&settings.store).await?;
            let cursor = store.get_cursor(&settings.ingest.worker_id).await?;
            println!(
                "Store '{}' is reachable (cursor {cursor})",
                settings.store.kind()
            );

            if upstream {
                let source = build_source(&settings.ingest)?;
                let page = source.fetch(cursor.saturating_add(1), 1).await?;
                println!(
                    "Upstream '{}' is reachable ({} event(s) after {cursor})",
                    source.describe(),
                    page.len()
                );
            }
            Ok(ExitCode::Success)
        }
    }
}

fn load_settings(
    env_file: Option<&Path>,
    worker_id: Option<String>,
) -> Result<WorkerSettings, CliError> {
    let mut env = EnvManager::new();
    match env_file {
        Some(path) => env.load_from_file(path)?,
        None if Path::new(".env").exists() => env.load_from_file(".env")?,
        None => {}
    }
    if let Some(worker_id) = worker_id {
        env.set(KEY_WORKER_ID, worker_id);
    }
    Ok(WorkerSettings::from_env(&env)?)
}

async fn run_worker(settings: WorkerSettings) -> Result<ExitCode, CliError> {
    let store = open_store(&settings.store).await?;
    let source = build_source(&settings.ingest)?;

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let report = PollLoop::new(source, store, settings.ingest, shutdown.cancel_token())
        .run()
        .await?;
    info!(
        cycles = report.cycles,
        persisted = report.persisted,
        transient_failures = report.transient_failures,
        cursor = report.cursor,
        "Worker finished"
    );

    if shutdown.is_shutdown_requested() {
        Ok(ExitCode::ShutdownRequested)
    } else {
        Ok(ExitCode::Success)
    }
}

async fn parcel_view(store: &dyn ScanStore, parcel_id: i64) -> Result<ParcelView, CliError> {
    Ok(ParcelView {
        parcel_id,
        latest: store.latest_event_for_parcel(parcel_id).await?,
        picked_up_at: store
            .first_event_time(parcel_id, ScanEventType::Pickup)
            .await?,
        delivered_at: store
            .first_event_time(parcel_id, ScanEventType::Delivery)
            .await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_env_file_after_subcommand() {
        let cli = Cli::try_parse_from([
            "scantrack",
            "set-cursor",
            "--event-id",
            "120",
            "--env-file",
            "worker.env",
        ])
        .unwrap();

        assert_eq!(cli.env_file, Some(PathBuf::from("worker.env")));
        assert!(matches!(
            cli.command,
            Commands::SetCursor {
                event_id: 120,
                worker_id: None
            }
        ));
    }

    #[test]
    fn set_cursor_rejects_negative_event_ids() {
        assert!(Cli::try_parse_from(["scantrack", "set-cursor", "--event-id", "-5"]).is_err());
        let err = Cli::try_parse_from(["scantrack", "set-cursor", "--event-id=-5"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from(["scantrack", "set-cursor", "--event-id", "0"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::SetCursor { event_id: 0, .. }
        ));
    }

    #[test]
    fn status_defaults_to_table_output() {
        let cli = Cli::try_parse_from(["scantrack", "status", "--worker-id", "W_CHC"]).unwrap();
        match cli.command {
            Commands::Status { worker_id, json } => {
                assert_eq!(worker_id.as_deref(), Some("W_CHC"));
                assert!(!json);
            }
            _ => panic!("expected status command"),
        }
    }

    #[test]
    fn exit_code_for_signal_shutdown() {
        assert_eq!(ExitCode::ShutdownRequested.as_i32(), 130);
    }
}
