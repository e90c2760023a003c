//! Command-line entry point of the MySQL to BigQuery pipeline.
//!
//! `etl-replicator run` performs one pipeline run and exits with code 0 on success or 1 on
//! failure. `etl-replicator serve` exposes the same run over HTTP.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use etl_config::Environment;
use etl_config::shared::ReplicatorConfig;
use etl_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_replicator_config;
use crate::core::run_pipeline;
use crate::error::{ReplicatorError, ReplicatorResult};
use crate::server::serve;

mod config;
mod core;
mod error;
mod server;

#[derive(Parser)]
#[command(name = "etl-replicator", about = "Incremental MySQL to BigQuery pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Default, Clone, Copy)]
enum Command {
    /// Run the pipeline once and exit
    #[default]
    Run,
    /// Serve the HTTP trigger (`GET /` runs the pipeline)
    Serve,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match try_main(args.command.unwrap_or_default()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn try_main(command: Command) -> ReplicatorResult<()> {
    let environment = Environment::load().map_err(ReplicatorError::config)?;
    let config = load_replicator_config()?;

    init_tracing(env!("CARGO_BIN_NAME"), environment).map_err(ReplicatorError::config)?;

    actix_web::rt::System::new().block_on(async_main(command, config, environment))
}

async fn async_main(
    command: Command,
    config: ReplicatorConfig,
    environment: Environment,
) -> ReplicatorResult<()> {
    match command {
        Command::Run => match run_pipeline(&config, environment).await {
            Ok(summary) => {
                info!(
                    tables = summary.tables.len(),
                    rows_loaded = summary.rows_loaded(),
                    "etl pipeline completed successfully"
                );
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "etl pipeline failed");
                Err(err)
            }
        },
        Command::Serve => serve(config, environment).await,
    }
}
