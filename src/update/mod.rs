//! Remote submission of records to an OpenUpdate cataloging service.
//!
//! The dispatcher only knows the [`RemoteUpdater`] trait. The production
//! implementation is [`UpdateServiceClient`], which speaks SOAP over HTTP;
//! tests plug in scripted updaters.

mod client;
mod payload;
mod response;

pub use client::{UpdateServiceClient, UpdateServiceConfig};
pub use payload::{update_request_envelope, UPDATE_RECORD_EXTRA_DATA_NS};
pub use response::parse_update_response;

use crate::error::MarcError;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;

/// Errors raised while submitting a record.
///
/// Every variant is a transport fault from the job's point of view.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// A required request argument was missing or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The record could not be rendered as MARCXchange
    #[error("Could not build update request: {0}")]
    Payload(#[from] MarcError),

    /// The SOAP envelope could not be serialized
    #[error("Could not serialize update request: {0}")]
    Serialize(#[from] quick_xml::DeError),

    /// Network or HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status without a SOAP fault
    #[error("HTTP error ({status}): {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The service answered with a SOAP fault
    #[error("SOAP fault {code}: {message}")]
    Fault {
        /// `faultcode`
        code: String,
        /// `faultstring`
        message: String,
    },

    /// The response could not be understood
    #[error("Malformed update response: {0}")]
    MalformedResponse(String),
}

/// Extra record data sent along with every record of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    /// Queue priority of the update
    pub priority: Option<u32>,
    /// Name of the provider the update is queued for
    pub provider: Option<String>,
}

impl SubmissionMetadata {
    /// True when no extra record data is sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.provider.is_none()
    }
}

/// `updateStatus` reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStatus {
    /// The record was accepted
    Ok,
    /// The record was rejected
    Failed,
    /// Any status this client does not know
    Other(String),
}

impl UpdateStatus {
    /// Parse the wire value (`ok`, `failed`, ...).
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "ok" => UpdateStatus::Ok,
            "failed" => UpdateStatus::Failed,
            other => UpdateStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::Ok => write!(f, "ok"),
            UpdateStatus::Failed => write!(f, "failed"),
            UpdateStatus::Other(other) => write!(f, "{other}"),
        }
    }
}

/// Structured answer to one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOutcome {
    /// Overall status
    pub status: UpdateStatus,
    /// Validation messages, in the order the service sent them
    pub messages: Option<Vec<String>>,
    /// Key of a double record conflict
    pub double_record_key: Option<String>,
    /// Messages of the double record entries
    pub double_record_entries: Option<Vec<String>>,
}

impl RemoteOutcome {
    /// Accepted record with no further details.
    #[must_use]
    pub fn ok() -> Self {
        RemoteOutcome {
            status: UpdateStatus::Ok,
            messages: None,
            double_record_key: None,
            double_record_entries: None,
        }
    }

    /// Rejected record carrying validation messages.
    #[must_use]
    pub fn failed_with_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RemoteOutcome {
            status: UpdateStatus::Failed,
            messages: Some(messages.into_iter().map(Into::into).collect()),
            double_record_key: None,
            double_record_entries: None,
        }
    }
}

/// One synchronous remote submission per call.
///
/// Implementations are shared by every worker thread of a job and must be
/// reentrant.
pub trait RemoteUpdater: Send + Sync + Debug {
    /// Submit `record` with `metadata`.
    ///
    /// # Errors
    ///
    /// Returns an [`UpdateError`] when the request cannot be built, sent or
    /// understood. Rejections by the service are not errors; they are
    /// reported in the returned [`RemoteOutcome`].
    fn submit(
        &self,
        record: &Record,
        metadata: &SubmissionMetadata,
    ) -> Result<RemoteOutcome, UpdateError>;
}

impl<U: RemoteUpdater + ?Sized> RemoteUpdater for std::sync::Arc<U> {
    fn submit(
        &self,
        record: &Record,
        metadata: &SubmissionMetadata,
    ) -> Result<RemoteOutcome, UpdateError> {
        (**self).submit(record, metadata)
    }
}

impl<U: RemoteUpdater + ?Sized> RemoteUpdater for Box<U> {
    fn submit(
        &self,
        record: &Record,
        metadata: &SubmissionMetadata,
    ) -> Result<RemoteOutcome, UpdateError> {
        (**self).submit(record, metadata)
    }
}
