//! End-to-end update job: sniff the input, open a reader, dispatch.

use crate::config::{ConfigError, JobConfig};
use crate::dispatch::{DispatchEngine, DispatchError, JobSummary};
use crate::formats::open_reader;
use crate::outcome::OutcomeReporter;
use crate::sniffer::{FormatSniffer, SniffError};
use crate::update::RemoteUpdater;
use std::fmt::Debug;
use std::io::Read;
use thiserror::Error;
use tracing::info;

/// Fatal conditions of a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The configuration was rejected before any input was read
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The input could not be sampled
    #[error(transparent)]
    Sniff(#[from] SniffError),

    /// The job stopped while dispatching
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl JobError {
    /// Counters at the time the job stopped, if dispatching had started.
    #[must_use]
    pub fn summary(&self) -> Option<JobSummary> {
        match self {
            JobError::Dispatch(e) => e.summary(),
            JobError::Config(_) | JobError::Sniff(_) => None,
        }
    }
}

/// Sample size for an input: the configured size, capped by the input
/// length when that is known.
#[must_use]
pub fn sample_size_for(config: &JobConfig, input_len: Option<u64>) -> usize {
    match input_len.and_then(|len| usize::try_from(len).ok()) {
        Some(len) => config.sample_size.min(len),
        None => config.sample_size,
    }
}

/// Run a complete update job over `input`.
///
/// `input_len` is the input size when known (regular files); it caps the
/// sniffing sample.
///
/// # Errors
///
/// Returns a [`JobError`] for an invalid configuration, an unreadable input,
/// or a job that aborted while dispatching.
pub fn run_job<R, U, P>(
    config: &JobConfig,
    input: R,
    input_len: Option<u64>,
    updater: U,
    reporter: P,
) -> Result<JobSummary, JobError>
where
    R: Read + Debug + 'static,
    U: RemoteUpdater,
    P: OutcomeReporter,
{
    config.validate()?;
    log_banner(config);

    let charset = config.charset()?;
    let sniffer = FormatSniffer::new(sample_size_for(config, input_len));
    let (format, input) = sniffer.sniff(input, charset)?;
    info!("Reading {format} records as {}", charset.for_format(format));

    let mut source = open_reader(
        input,
        format,
        charset.for_format(format),
        config.reader_options(),
    );
    let engine = DispatchEngine::new(
        updater,
        reporter,
        config.metadata(),
        config.dispatch_limits(),
    )?;
    Ok(engine.run(source.as_mut())?)
}

fn log_banner(config: &JobConfig) {
    let unset = || "<none>".to_string();
    info!("***************************");
    info!("* Update Service URL: {}", config.endpoint);
    info!("*           Username: {}", config.username);
    info!("*              Group: {}", config.group_id);
    info!("*           Password: {}", config.masked_password());
    info!("*           Template: {}", config.template);
    info!("*        Tracking Id: {}", config.tracking_id.clone().unwrap_or_else(unset));
    info!(
        "*           Priority: {}",
        config.priority.map_or_else(unset, |p| p.to_string())
    );
    info!("*           Provider: {}", config.provider.clone().unwrap_or_else(unset));
    info!("*      Validate Only: {}", config.validate_only);
    info!("*        Error Limit: {}", config.error_limit);
    info!("***************************");
}
