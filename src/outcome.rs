//! Per-record submission outcomes and how they are reported.
//!
//! Every submission resolves to a [`SubmissionOutcome`]. Non-success
//! outcomes go to an [`OutcomeReporter`] together with the record's
//! [`RecordIdentifier`]; reporting is a side effect only and never changes
//! job counters.

use crate::dispatch::JobSummary;
use crate::record::RecordIdentifier;
use crate::update::{RemoteOutcome, UpdateStatus};
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{error, info, warn};

/// Result of submitting one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubmissionOutcome {
    /// The service accepted the record
    Success,
    /// The service rejected the record with validation messages
    ValidationFailure {
        /// Messages in the order the service sent them
        messages: Vec<String>,
    },
    /// The record duplicates one already known to the service
    DuplicateConflict {
        /// Double record key
        key: String,
        /// Distinct messages, first occurrence first
        messages: Vec<String>,
    },
    /// The submission itself failed; this aborts the job
    TransportFailure {
        /// Description of the failure
        cause: String,
    },
}

impl SubmissionOutcome {
    /// Classify a service answer.
    #[must_use]
    pub fn from_remote(remote: RemoteOutcome) -> Self {
        if remote.status == UpdateStatus::Ok {
            return SubmissionOutcome::Success;
        }

        if let Some(messages) = remote.messages.filter(|m| !m.is_empty()) {
            return SubmissionOutcome::ValidationFailure { messages };
        }

        if let Some(entries) = remote.double_record_entries {
            let unique: IndexSet<String> = entries.into_iter().collect();
            return SubmissionOutcome::DuplicateConflict {
                key: remote.double_record_key.unwrap_or_default(),
                messages: unique.into_iter().collect(),
            };
        }

        SubmissionOutcome::ValidationFailure {
            messages: vec![format!("update status '{}'", remote.status)],
        }
    }

    /// Outcome for a failure raised while submitting.
    #[must_use]
    pub fn transport(cause: impl Into<String>) -> Self {
        SubmissionOutcome::TransportFailure {
            cause: cause.into(),
        }
    }

    /// True for [`SubmissionOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success)
    }

    /// True for outcomes that abort the job.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, SubmissionOutcome::TransportFailure { .. })
    }
}

/// Render the diagnostic line for a non-success outcome.
///
/// ```
/// use marc_update::outcome::{render_outcome, SubmissionOutcome};
/// use marc_update::RecordIdentifier;
///
/// let id = RecordIdentifier {
///     record_id: "50938409".to_string(),
///     agency_id: "870970".to_string(),
/// };
/// let outcome = SubmissionOutcome::ValidationFailure {
///     messages: vec!["m1".to_string(), "m2".to_string()],
/// };
/// assert_eq!(
///     render_outcome(&id, &outcome).as_deref(),
///     Some("Error updating '50938409:870970'. Got message: m1, m2")
/// );
/// ```
#[must_use]
pub fn render_outcome(id: &RecordIdentifier, outcome: &SubmissionOutcome) -> Option<String> {
    match outcome {
        SubmissionOutcome::Success => None,
        SubmissionOutcome::ValidationFailure { messages } => Some(format!(
            "Error updating '{id}'. Got message: {}",
            messages.join(", ")
        )),
        SubmissionOutcome::DuplicateConflict { key, messages } => Some(format!(
            "Error updating '{id}'. Got double record error with key: {key} and message(s): {}",
            messages.join(", ")
        )),
        SubmissionOutcome::TransportFailure { cause } => Some(format!(
            "Caught exception from update of '{id}': {cause}"
        )),
    }
}

/// Receives outcomes and progress from a running job.
///
/// Called from worker threads concurrently.
pub trait OutcomeReporter: Send + Sync {
    /// Report the outcome of one record. Success outcomes are not reported.
    fn report(&self, id: &RecordIdentifier, outcome: &SubmissionOutcome);

    /// Called after every batch drain with the counters at that point.
    fn batch_drained(&self, summary: &JobSummary) {
        info!("Processed {} records", summary.total);
    }
}

impl<P: OutcomeReporter + ?Sized> OutcomeReporter for std::sync::Arc<P> {
    fn report(&self, id: &RecordIdentifier, outcome: &SubmissionOutcome) {
        (**self).report(id, outcome);
    }

    fn batch_drained(&self, summary: &JobSummary) {
        (**self).batch_drained(summary);
    }
}

/// Writes rendered outcomes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl OutcomeReporter for LogReporter {
    fn report(&self, id: &RecordIdentifier, outcome: &SubmissionOutcome) {
        let Some(line) = render_outcome(id, outcome) else {
            return;
        };
        if outcome.is_fatal() {
            error!("{line}");
        } else {
            warn!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> RecordIdentifier {
        RecordIdentifier {
            record_id: "50938409".to_string(),
            agency_id: "870970".to_string(),
        }
    }

    #[test]
    fn test_ok_is_success() {
        assert!(SubmissionOutcome::from_remote(RemoteOutcome::ok()).is_success());
    }

    #[test]
    fn test_messages_win_over_double_record() {
        let remote = RemoteOutcome {
            double_record_key: Some("k".to_string()),
            double_record_entries: Some(vec!["dup".to_string()]),
            ..RemoteOutcome::failed_with_messages(["m1"])
        };
        assert_eq!(
            SubmissionOutcome::from_remote(remote),
            SubmissionOutcome::ValidationFailure {
                messages: vec!["m1".to_string()]
            }
        );
    }

    #[test]
    fn test_duplicate_messages_are_deduplicated_in_order() {
        let remote = RemoteOutcome {
            status: UpdateStatus::Failed,
            messages: None,
            double_record_key: Some("abc-123".to_string()),
            double_record_entries: Some(
                ["same", "other", "same"].iter().map(ToString::to_string).collect(),
            ),
        };
        let outcome = SubmissionOutcome::from_remote(remote);
        assert_eq!(
            render_outcome(&id(), &outcome).as_deref(),
            Some(
                "Error updating '50938409:870970'. Got double record error with key: \
                 abc-123 and message(s): same, other"
            )
        );
    }

    #[test]
    fn test_failed_without_details_names_status() {
        let remote = RemoteOutcome {
            status: UpdateStatus::Failed,
            ..RemoteOutcome::ok()
        };
        let outcome = SubmissionOutcome::from_remote(remote);
        assert!(matches!(outcome, SubmissionOutcome::ValidationFailure { .. }));
        assert!(!outcome.is_fatal());
        assert_eq!(
            render_outcome(&id(), &outcome).as_deref(),
            Some("Error updating '50938409:870970'. Got message: update status 'failed'")
        );
    }

    #[test]
    fn test_transport_failure_rendering() {
        let outcome = SubmissionOutcome::transport("connection refused");
        assert!(outcome.is_fatal());
        assert_eq!(
            render_outcome(&RecordIdentifier::unknown(), &outcome).as_deref(),
            Some("Caught exception from update of 'unknown:unknown': connection refused")
        );
    }

    #[test]
    fn test_success_is_not_rendered() {
        assert!(render_outcome(&id(), &SubmissionOutcome::Success).is_none());
    }
}
