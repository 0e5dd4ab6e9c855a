//! Batched, bounded-concurrency submission of records.
//!
//! [`DispatchEngine::run`] pulls records from a [`FormatReader`] one at a
//! time and submits each on a fixed-size rayon pool through a
//! [`RemoteUpdater`]. At most `worker_count` submissions are in flight; every
//! `batch_size` admissions the engine waits for the pool to drain and reports
//! progress. Before each admission the abort policy is checked:
//!
//! - a transport failure aborts the job, also when it happens in the last batch
//! - with `error_limit >= 0`, more than `error_limit` errors abort the job
//!
//! In-flight submissions always finish; aborting only stops new admissions.

use crate::error::MarcError;
use crate::formats::FormatReader;
use crate::outcome::{OutcomeReporter, SubmissionOutcome};
use crate::record::Record;
use crate::update::{RemoteUpdater, SubmissionMetadata};
use crossbeam_channel::{bounded, Receiver};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, trace, warn};

/// Error limit meaning "never abort on errors".
pub const UNLIMITED_ERRORS: i64 = -1;

/// Concurrency and abort settings of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchLimits {
    /// `-1` unlimited, `0` abort on the first error, `N` abort once errors exceed `N`
    pub error_limit: i64,
    /// Admissions between two drains
    pub batch_size: usize,
    /// Pool size and maximum number of in-flight submissions
    pub worker_count: usize,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            error_limit: 100,
            batch_size: 100,
            worker_count: 8,
        }
    }
}

/// Counts of a job, as seen at some point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Records pulled from the source and admitted
    pub total: usize,
    /// Records the service accepted
    pub success: usize,
    /// Records that failed for any reason
    pub error: usize,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} with success, {} with error",
            self.total, self.success, self.error
        )
    }
}

/// Counters shared by the dispatch loop and all workers of one job.
#[derive(Debug, Default)]
pub struct JobCounters {
    total: AtomicUsize,
    success: AtomicUsize,
    error: AtomicUsize,
    fault: Mutex<Option<String>>,
}

impl JobCounters {
    /// Current counts.
    pub fn snapshot(&self) -> JobSummary {
        JobSummary {
            total: self.total.load(Ordering::SeqCst),
            success: self.success.load(Ordering::SeqCst),
            error: self.error.load(Ordering::SeqCst),
        }
    }

    fn admitted(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    /// Count a resolved outcome; the first transport failure is remembered.
    fn resolved(&self, outcome: &SubmissionOutcome) {
        if outcome.is_success() {
            self.success.fetch_add(1, Ordering::SeqCst);
            return;
        }
        if let SubmissionOutcome::TransportFailure { cause } = outcome {
            let mut fault = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
            fault.get_or_insert_with(|| cause.clone());
        }
        self.error.fetch_add(1, Ordering::SeqCst);
    }

    fn fault(&self) -> Option<String> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Lifecycle of a [`DispatchEngine`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Not started
    Idle,
    /// Admitting and submitting records
    Running,
    /// Source exhausted and every submission drained
    Completed,
    /// Stopped early; in-flight work was drained
    Aborted,
}

/// Fatal conditions ending a job.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// More errors than the error limit allows
    #[error("Hit error limit {limit}, so aborting ({summary})")]
    ErrorLimitExceeded {
        /// Configured error limit
        limit: i64,
        /// Counters after the final drain
        summary: JobSummary,
    },

    /// A submission failed in transport
    #[error("Aborting after update failure: {cause} ({summary})")]
    TransportFault {
        /// Description of the first transport failure
        cause: String,
        /// Counters after the final drain
        summary: JobSummary,
    },

    /// The record source failed to decode a record
    #[error("Could not read record: {source} ({summary})")]
    Decode {
        /// Decoder error
        source: MarcError,
        /// Counters after the final drain
        summary: JobSummary,
    },

    /// The limits cannot be run
    #[error("Invalid dispatch limits: {0}")]
    InvalidLimits(String),

    /// The worker pool could not be started
    #[error("Could not start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl DispatchError {
    /// Counters at the time the job stopped, for aborts during a run.
    #[must_use]
    pub fn summary(&self) -> Option<JobSummary> {
        match self {
            DispatchError::ErrorLimitExceeded { summary, .. }
            | DispatchError::TransportFault { summary, .. }
            | DispatchError::Decode { summary, .. } => Some(*summary),
            DispatchError::InvalidLimits(_) | DispatchError::Pool(_) => None,
        }
    }
}

/// Why the dispatch loop stopped admitting records.
enum Stop {
    ErrorLimit,
    Transport(String),
    Decode(MarcError),
}

/// One in-flight slot; dropping it frees the slot.
struct Permit<'a>(&'a Receiver<()>);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

/// Drives records from a source through a [`RemoteUpdater`].
pub struct DispatchEngine<U, P> {
    updater: U,
    reporter: P,
    metadata: SubmissionMetadata,
    limits: DispatchLimits,
    pool: ThreadPool,
    state: Mutex<JobState>,
}

impl<U, P> fmt::Debug for DispatchEngine<U, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("metadata", &self.metadata)
            .field("limits", &self.limits)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<U, P> DispatchEngine<U, P> {
    /// Limits this engine runs with.
    #[must_use]
    pub fn limits(&self) -> DispatchLimits {
        self.limits
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: JobState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl<U: RemoteUpdater, P: OutcomeReporter> DispatchEngine<U, P> {
    /// Create an engine and its worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidLimits`] for a zero worker count or
    /// batch size or an error limit below `-1`, and [`DispatchError::Pool`]
    /// if the threads cannot be spawned.
    pub fn new(
        updater: U,
        reporter: P,
        metadata: SubmissionMetadata,
        limits: DispatchLimits,
    ) -> Result<Self, DispatchError> {
        if limits.worker_count == 0 {
            return Err(DispatchError::InvalidLimits(
                "worker count must be at least 1".to_string(),
            ));
        }
        if limits.batch_size == 0 {
            return Err(DispatchError::InvalidLimits(
                "batch size must be at least 1".to_string(),
            ));
        }
        if limits.error_limit < UNLIMITED_ERRORS {
            return Err(DispatchError::InvalidLimits(format!(
                "error limit must be -1 or more, got {}",
                limits.error_limit
            )));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(limits.worker_count)
            .thread_name(|i| format!("update-worker-{i}"))
            .build()?;

        Ok(Self {
            updater,
            reporter,
            metadata,
            limits,
            pool,
            state: Mutex::new(JobState::Idle),
        })
    }

    /// Submit every record of `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] carrying the counters after the final
    /// drain when the error limit is exceeded, a submission fails in
    /// transport, or the source fails to decode a record.
    pub fn run<S: FormatReader + ?Sized>(&self, source: &mut S) -> Result<JobSummary, DispatchError> {
        let counters = JobCounters::default();
        let (slots, freed) = bounded::<()>(self.limits.worker_count);
        let mut exhausted = false;
        let mut stop: Option<Stop> = None;

        self.set_state(JobState::Running);
        info!(
            "Dispatching records: workers={}, batch_size={}, error_limit={}",
            self.limits.worker_count, self.limits.batch_size, self.limits.error_limit
        );

        while !exhausted && stop.is_none() {
            let admitted = self.pool.in_place_scope(|scope| {
                let mut admitted = 0;
                while admitted < self.limits.batch_size {
                    if slots.send(()).is_err() {
                        break;
                    }
                    let permit = Permit(&freed);

                    if let Some(reason) = self.abort_reason(&counters) {
                        stop = Some(reason);
                        break;
                    }

                    match source.read_record() {
                        Ok(Some(record)) => {
                            counters.admitted();
                            admitted += 1;
                            let counters = &counters;
                            scope.spawn(move |_| {
                                let _permit = permit;
                                self.submit(record, counters);
                            });
                        },
                        Ok(None) => {
                            exhausted = true;
                            break;
                        },
                        Err(e) => {
                            debug!(
                                records_read = ?source.records_read(),
                                "Record source failed: {e}"
                            );
                            stop = Some(Stop::Decode(e));
                            break;
                        },
                    }
                }
                admitted
            });

            if admitted > 0 {
                self.reporter.batch_drained(&counters.snapshot());
            }
        }

        // A fault raised by the last submissions has no later admission to trip.
        if stop.is_none() {
            stop = counters.fault().map(Stop::Transport);
        }

        let summary = counters.snapshot();
        let result = match stop {
            None => Ok(summary),
            Some(Stop::ErrorLimit) => Err(DispatchError::ErrorLimitExceeded {
                limit: self.limits.error_limit,
                summary,
            }),
            Some(Stop::Transport(cause)) => Err(DispatchError::TransportFault { cause, summary }),
            Some(Stop::Decode(source)) => Err(DispatchError::Decode { source, summary }),
        };

        match &result {
            Ok(summary) => {
                self.set_state(JobState::Completed);
                info!("DONE: processed a total of {summary}");
            },
            Err(e) => {
                self.set_state(JobState::Aborted);
                debug!("Job aborted: {e}");
            },
        }
        result
    }

    fn abort_reason(&self, counters: &JobCounters) -> Option<Stop> {
        if let Some(cause) = counters.fault() {
            return Some(Stop::Transport(cause));
        }
        let errors = counters.snapshot().error;
        let over_limit = usize::try_from(self.limits.error_limit)
            .map(|limit| errors > limit)
            .unwrap_or(false);
        over_limit.then_some(Stop::ErrorLimit)
    }

    /// Worker body: submit, classify, count, report.
    fn submit(&self, record: Record, counters: &JobCounters) {
        let id = record.identifier();
        trace!(record = %id, "Submitting record");

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.updater.submit(&record, &self.metadata)
        }));
        let outcome = match attempt {
            Ok(Ok(remote)) => SubmissionOutcome::from_remote(remote),
            Ok(Err(e)) => SubmissionOutcome::transport(e.to_string()),
            Err(panic) => SubmissionOutcome::transport(panic_message(panic.as_ref())),
        };

        counters.resolved(&outcome);
        if outcome.is_success() {
            return;
        }
        let reported = panic::catch_unwind(AssertUnwindSafe(|| {
            self.reporter.report(&id, &outcome);
        }));
        if let Err(panic) = reported {
            warn!(record = %id, "Reporting outcome failed: {}", panic_message(panic.as_ref()));
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("worker panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("worker panicked: {message}")
    } else {
        "worker panicked".to_string()
    }
}
