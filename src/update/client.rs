//! Blocking SOAP client for the OpenUpdate `updateRecord` operation.

use super::payload::CATALOGING_UPDATE_NS;
use super::{
    parse_update_response, update_request_envelope, RemoteOutcome, RemoteUpdater,
    SubmissionMetadata, UpdateError,
};
use crate::record::Record;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Default connect timeout: one minute.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default request timeout: one hour, updates can queue for a long time.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Configuration of the update service client.
#[derive(Debug, Clone)]
pub struct UpdateServiceConfig {
    /// Service endpoint, e.g. `http://host:8080/UpdateService/2.0`
    pub endpoint: String,
    /// `userIdAut`
    pub username: String,
    /// `passwordAut`
    pub password: String,
    /// `groupIdAut`, the agency the update is made on behalf of
    pub group_id: String,
    /// `schemaName`, the template records are validated against
    pub template: String,
    /// Optional `trackingId` sent with every request
    pub tracking_id: Option<String>,
    /// Only validate, never store
    pub validate_only: bool,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout
    pub request_timeout: Duration,
}

impl Default for UpdateServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: "netpunkt".to_string(),
            password: "not-used".to_string(),
            group_id: "010100".to_string(),
            template: "dbc".to_string(),
            tracking_id: None,
            validate_only: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// [`RemoteUpdater`] talking to an OpenUpdate service over HTTP.
#[derive(Debug)]
pub struct UpdateServiceClient {
    client: Client,
    config: UpdateServiceConfig,
    soap_action: String,
}

impl UpdateServiceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidArgument`] for an empty endpoint, group
    /// id or template, and [`UpdateError::Http`] if the HTTP client cannot
    /// be built.
    pub fn new(config: UpdateServiceConfig) -> Result<Self, UpdateError> {
        for (value, name) in [
            (&config.endpoint, "endpoint"),
            (&config.group_id, "groupId"),
            (&config.template, "template"),
        ] {
            if value.trim().is_empty() {
                return Err(UpdateError::InvalidArgument(format!(
                    "{name} must not be empty"
                )));
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        info!(
            "Update service client ready: endpoint={}, validate_only={}",
            config.endpoint, config.validate_only
        );

        Ok(Self {
            client,
            soap_action: format!("\"{CATALOGING_UPDATE_NS}/UpdateRecord\""),
            config,
        })
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &UpdateServiceConfig {
        &self.config
    }
}

impl RemoteUpdater for UpdateServiceClient {
    fn submit(
        &self,
        record: &Record,
        metadata: &SubmissionMetadata,
    ) -> Result<RemoteOutcome, UpdateError> {
        let envelope = update_request_envelope(&self.config, record, metadata)?;
        trace!("Using endpoint: {}", self.config.endpoint);

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("SOAPAction", &self.soap_action)
            .body(envelope)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        debug!(
            record = %record.identifier(),
            status = status.as_u16(),
            bytes = body.len(),
            "Update service answered"
        );

        if !status.is_success() {
            // SOAP 1.1 delivers faults with status 500
            return match parse_update_response(&body) {
                Err(fault @ UpdateError::Fault { .. }) => Err(fault),
                _ => Err(UpdateError::Status {
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        parse_update_response(&body)
    }
}
