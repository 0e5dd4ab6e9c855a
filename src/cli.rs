//! Command line arguments of the `marc-update` binary.

use crate::config::JobConfig;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Send all records from a file to an OpenUpdate service.
#[derive(Debug, Parser)]
#[command(name = "marc-update")]
#[command(about = "Send all records from a file to an OpenUpdate service")]
#[command(version)]
pub struct Cli {
    /// URL of the update service, e.g. http://host/UpdateService/2.0
    #[arg(short = 'u', long = "url", env = "MARC_UPDATE_URL")]
    pub url: String,

    /// User name sent when calling update
    #[arg(long, default_value = "netpunkt")]
    pub username: String,

    /// Group (agency) sent when calling update
    #[arg(long, default_value = "010100")]
    pub group_id: String,

    /// Password sent when calling update
    #[arg(
        long,
        env = "MARC_UPDATE_PASSWORD",
        hide_env_values = true,
        default_value = "not-used"
    )]
    pub password: String,

    /// Template to validate records against
    #[arg(short = 't', long, default_value = "dbc")]
    pub template: String,

    /// Tracking id sent with every request
    #[arg(long)]
    pub tracking_id: Option<String>,

    /// Max errors before aborting; 0 aborts on the first error, -1 ignores all errors
    #[arg(
        short = 'l',
        long,
        default_value_t = 100,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i64).range(-1..)
    )]
    pub error_limit: i64,

    /// Priority of the updates; 500 or lower competes with interactive cataloging
    #[arg(long, default_value_t = 1000)]
    pub priority: u32,

    /// Provider to queue updates for; the service chooses when not set
    #[arg(long)]
    pub provider: Option<String>,

    /// Only validate records; pass `false` to actually update them
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool)
    )]
    pub validate_only: Option<bool>,

    /// Concurrent submissions
    #[arg(short = 'w', long, default_value_t = 8)]
    pub workers: usize,

    /// Records between progress reports
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Bytes inspected to detect the input format
    #[arg(long, default_value_t = 1000)]
    pub sample_size: usize,

    /// Input charset (utf-8, latin1, danmarc2, ...)
    #[arg(long, default_value = "utf-8")]
    pub charset: String,

    /// Keep leading whitespace in line-format subfield values
    #[arg(long)]
    pub include_whitespace_padding: bool,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub connect_timeout: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 3600)]
    pub request_timeout: u64,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    pub json_summary: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Input file, or `-` for standard input (MARCXchange, line format or ISO 2709)
    #[arg(value_name = "IN")]
    pub input: PathBuf,
}

impl Cli {
    /// Job configuration described by the arguments.
    #[must_use]
    pub fn to_config(&self) -> JobConfig {
        JobConfig {
            endpoint: self.url.clone(),
            username: self.username.clone(),
            group_id: self.group_id.clone(),
            password: self.password.clone(),
            template: self.template.clone(),
            tracking_id: self.tracking_id.clone(),
            priority: Some(self.priority),
            provider: self.provider.clone(),
            validate_only: self.validate_only.unwrap_or(true),
            error_limit: self.error_limit,
            worker_count: self.workers,
            batch_size: self.batch_size,
            sample_size: self.sample_size,
            charset: self.charset.clone(),
            include_whitespace_padding: self.include_whitespace_padding,
            connect_timeout_secs: self.connect_timeout,
            request_timeout_secs: self.request_timeout,
        }
    }

    /// True when the input is standard input.
    #[must_use]
    pub fn reads_stdin(&self) -> bool {
        self.input == Path::new("-")
    }

    /// Default log filter for the chosen verbosity.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
