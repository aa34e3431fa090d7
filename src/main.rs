mod app;
mod cli;
mod diagnostics;
mod error;
mod gcp;
mod report;

use std::{io, process::ExitCode, time::Duration};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracerouter_core::load_config;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::{
    app::{Mode, RunOptions},
    cli::Cli,
    diagnostics::{DiagnosticRunner, ToolConfig},
    error::Error,
    gcp::GcloudBackend,
    report::Report,
};

async fn shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received, stopping");
            cancel.cancel();
        }
        Err(e) => warn!("unable to listen for interrupts: {e}"),
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = load_config();
    let opts = RunOptions {
        pattern: cli.match_pattern,
        concurrency: cli.concurrency,
        project: cli.project,
        dig: cli.dig,
        mode: Mode::from_flags(cli.print, cli.reverse_traceroute),
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));
    let runner = DiagnosticRunner::new(
        ToolConfig::from_env(&config.gcloud_bin),
        cli.timeout.map(Duration::from_secs),
        cancel,
    );

    let mut report = Report::new(io::stdout());
    app::run(&opts, &GcloudBackend::new(config), &runner, &mut report).await?;
    report.finish()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
