//! marc-update: send every record of a MARC file to an OpenUpdate service.

use anyhow::{Context, Result};
use clap::Parser;
use marc_update::cli::Cli;
use marc_update::dispatch::JobSummary;
use marc_update::job::run_job;
use marc_update::outcome::LogReporter;
use marc_update::update::UpdateServiceClient;
use std::fs::File;
use std::io;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.to_config();
    config.validate()?;

    let client = UpdateServiceClient::new(config.update_service_config())
        .context("Could not create update service client")?;

    let result = if cli.reads_stdin() {
        run_job(&config, io::stdin(), None, client, LogReporter)
    } else {
        let file = File::open(&cli.input)
            .with_context(|| format!("Could not read file {}", cli.input.display()))?;
        let len = file.metadata().ok().map(|m| m.len());
        run_job(&config, file, len, client, LogReporter)
    };

    match result {
        Ok(summary) => print_summary(cli, &summary),
        Err(e) => {
            if let Some(summary) = e.summary() {
                print_summary(cli, &summary)?;
            }
            Err(e.into())
        },
    }
}

fn print_summary(cli: &Cli, summary: &JobSummary) -> Result<()> {
    if cli.json_summary {
        println!("{}", serde_json::to_string(summary)?);
    }
    Ok(())
}
