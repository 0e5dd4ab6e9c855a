//! Job configuration.
//!
//! [`JobConfig`] holds every tunable of an update job. It is built by the
//! command line front end but is plain serde data, so it can equally be
//! loaded from JSON or constructed in code.

use crate::charset::Charset;
use crate::dispatch::{DispatchLimits, UNLIMITED_ERRORS};
use crate::formats::ReaderOptions;
use crate::sniffer::DEFAULT_SAMPLE_SIZE;
use crate::update::{SubmissionMetadata, UpdateServiceConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

fn default_username() -> String {
    "netpunkt".to_string()
}

fn default_group_id() -> String {
    "010100".to_string()
}

fn default_password() -> String {
    "not-used".to_string()
}

fn default_template() -> String {
    "dbc".to_string()
}

fn default_priority() -> Option<u32> {
    Some(1000)
}

fn default_charset() -> String {
    "utf-8".to_string()
}

/// Invalid job configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more settings are out of range; all problems are listed
    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Every setting of an update job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// OpenUpdate service URL
    pub endpoint: String,
    /// User id sent in the authentication block
    #[serde(default = "default_username")]
    pub username: String,
    /// Group (agency) id sent in the authentication block
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Password sent in the authentication block
    #[serde(default = "default_password")]
    pub password: String,
    /// Update template (schema name)
    #[serde(default = "default_template")]
    pub template: String,
    /// Tracking id attached to every request
    pub tracking_id: Option<String>,
    /// Queue priority passed to the service
    #[serde(default = "default_priority")]
    pub priority: Option<u32>,
    /// Provider name passed to the service
    pub provider: Option<String>,
    /// Ask the service to validate without updating
    pub validate_only: bool,
    /// `-1` never abort on errors, `N` abort once errors exceed `N`
    pub error_limit: i64,
    /// Concurrent submissions
    pub worker_count: usize,
    /// Admissions between progress drains
    pub batch_size: usize,
    /// Bytes read ahead to detect the input format
    pub sample_size: usize,
    /// Input charset label
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Keep leading whitespace in line-format subfield values
    pub include_whitespace_padding: bool,
    /// Seconds to wait for a connection
    pub connect_timeout_secs: u64,
    /// Seconds to wait for a full answer
    pub request_timeout_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        let limits = DispatchLimits::default();
        let service = UpdateServiceConfig::default();
        Self {
            endpoint: String::new(),
            username: default_username(),
            group_id: default_group_id(),
            password: default_password(),
            template: default_template(),
            tracking_id: None,
            priority: default_priority(),
            provider: None,
            validate_only: true,
            error_limit: limits.error_limit,
            worker_count: limits.worker_count,
            batch_size: limits.batch_size,
            sample_size: DEFAULT_SAMPLE_SIZE,
            charset: default_charset(),
            include_whitespace_padding: false,
            connect_timeout_secs: service.connect_timeout.as_secs(),
            request_timeout_secs: service.request_timeout.as_secs(),
        }
    }
}

impl JobConfig {
    /// Check all settings, reporting every problem at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing each offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.endpoint.trim().is_empty() {
            errors.push("endpoint must be set".to_string());
        }
        if self.group_id.trim().is_empty() {
            errors.push("group id must be set".to_string());
        }
        if self.template.trim().is_empty() {
            errors.push("template must be set".to_string());
        }
        if self.worker_count == 0 {
            errors.push("worker count must be positive".to_string());
        }
        if self.batch_size == 0 {
            errors.push("batch size must be positive".to_string());
        }
        if self.sample_size == 0 {
            errors.push("sample size must be positive".to_string());
        }
        if self.error_limit < UNLIMITED_ERRORS {
            errors.push(format!(
                "error limit must be -1 or more, got {}",
                self.error_limit
            ));
        }
        if let Err(e) = Charset::from_label(&self.charset) {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Concurrency and abort settings.
    #[must_use]
    pub fn dispatch_limits(&self) -> DispatchLimits {
        DispatchLimits {
            error_limit: self.error_limit,
            batch_size: self.batch_size,
            worker_count: self.worker_count,
        }
    }

    /// Settings for [`crate::update::UpdateServiceClient`].
    #[must_use]
    pub fn update_service_config(&self) -> UpdateServiceConfig {
        UpdateServiceConfig {
            endpoint: self.endpoint.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            group_id: self.group_id.clone(),
            template: self.template.clone(),
            tracking_id: self.tracking_id.clone(),
            validate_only: self.validate_only,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Metadata passed along with every record.
    #[must_use]
    pub fn metadata(&self) -> SubmissionMetadata {
        SubmissionMetadata {
            priority: self.priority,
            provider: self.provider.clone(),
        }
    }

    /// The input charset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown label.
    pub fn charset(&self) -> Result<Charset, ConfigError> {
        Charset::from_label(&self.charset).map_err(|e| ConfigError::Invalid(vec![e.to_string()]))
    }

    /// Options for line-format readers.
    #[must_use]
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            include_whitespace_padding: self.include_whitespace_padding,
        }
    }

    /// Password as shown in logs: first character then a fixed mask.
    #[must_use]
    pub fn masked_password(&self) -> String {
        match self.password.chars().next() {
            Some(first) => format!("{first}********"),
            None => String::new(),
        }
    }
}
