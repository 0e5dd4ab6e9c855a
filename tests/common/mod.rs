//! Common test helpers shared across the test suite.

#![allow(dead_code)]

use marc_update::dispatch::JobSummary;
use marc_update::formats::FormatReader;
use marc_update::update::{RemoteOutcome, SubmissionMetadata, UpdateError};
use marc_update::{Field, Leader, MarcError, Record, RecordIdentifier, RemoteUpdater, SubmissionOutcome};
use marc_update::OutcomeReporter;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Builds one ISO 2709 record from `(tag, body)` pairs.
///
/// Control field bodies are plain text; data field bodies start with the two
/// indicators and use `\x1F` before each subfield code.
pub fn iso_record(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut data = Vec::new();
    for (tag, body) in fields {
        let start = data.len();
        data.extend_from_slice(body.as_bytes());
        data.push(0x1E);
        directory.extend_from_slice(format!("{tag}{:04}{start:05}", data.len() - start).as_bytes());
    }
    directory.push(0x1E);
    data.push(0x1D);

    let base_address = 24 + directory.len();
    let record_length = base_address + data.len();
    let mut record = format!("{record_length:05}nam a22{base_address:05}   4500").into_bytes();
    record.extend_from_slice(&directory);
    record.extend_from_slice(&data);
    record
}

/// An ISO 2709 record with a DanMarc2 style `001 *a id *b agency` field.
pub fn iso_danmarc_record(id: &str, agency: &str, title: &str) -> Vec<u8> {
    iso_record(&[
        ("001", &format!("00\x1Fa{id}\x1Fb{agency}")),
        ("245", &format!("00\x1Fa{title}")),
    ])
}

/// A DanMarc2 line-format document with one record per id.
pub fn danmarc2_lines(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!("001 00 *a{id}*b870970\n245 00 *aTitle of {id}\n$\n"))
        .collect()
}

/// A MARC line-format document with one record per id.
pub fn marc_lines(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!("001 00 $a{id}$b870970\n245 00 $aTitle of {id}\n\n"))
        .collect()
}

/// A MARCXchange collection with one record per id.
pub fn marcxchange_collection(ids: &[&str]) -> String {
    let records: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<record><leader>00000n    2200000   4500</leader><datafield tag="001" ind1="0" ind2="0"><subfield code="a">{id}</subfield><subfield code="b">870970</subfield></datafield></record>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<collection xmlns="info:lc/xmlns/marcxchange-v1">{records}</collection>"#
    )
}

/// A record whose identifier is `id:870970`.
pub fn record_with_id(id: &str) -> Record {
    let mut record = Record::new(Leader::default());
    let mut field = Field::new("001".to_string(), '0', '0');
    field.add_subfield_str('a', id);
    field.add_subfield_str('b', "870970");
    record.add_field(field);
    record
}

/// Record source yielding records with ids `1..=count`, optionally failing
/// to decode at one position.
#[derive(Debug)]
pub struct NumberedSource {
    count: usize,
    next: usize,
    fail_at: Option<usize>,
}

impl NumberedSource {
    pub fn new(count: usize) -> Self {
        NumberedSource {
            count,
            next: 0,
            fail_at: None,
        }
    }

    /// Fail with a decode error instead of producing record `position`.
    pub fn failing_at(mut self, position: usize) -> Self {
        self.fail_at = Some(position);
        self
    }

    /// Records handed out so far.
    pub fn pulled(&self) -> usize {
        self.next
    }
}

impl FormatReader for NumberedSource {
    fn read_record(&mut self) -> marc_update::Result<Option<Record>> {
        if self.next >= self.count {
            return Ok(None);
        }
        let position = self.next + 1;
        if self.fail_at == Some(position) {
            return Err(MarcError::InvalidRecord(format!("record {position} is broken")));
        }
        self.next = position;
        Ok(Some(record_with_id(&position.to_string())))
    }
}

/// Updater answering by record id.
#[derive(Debug, Default)]
pub struct ScriptedUpdater {
    rejected: HashSet<String>,
    duplicates: HashSet<String>,
    unreachable: HashSet<String>,
    panicking: HashSet<String>,
    slow: HashSet<String>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

fn id_set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(ToString::to_string).collect()
}

impl ScriptedUpdater {
    pub fn accepting() -> Self {
        ScriptedUpdater::default()
    }

    /// Reject `ids` with a validation message.
    pub fn rejecting(ids: &[&str]) -> Self {
        ScriptedUpdater::default().with_rejected(ids)
    }

    pub fn with_rejected(mut self, ids: &[&str]) -> Self {
        self.rejected.extend(id_set(ids));
        self
    }

    /// Answer `ids` with a double record error.
    pub fn with_duplicates(mut self, ids: &[&str]) -> Self {
        self.duplicates.extend(id_set(ids));
        self
    }

    /// Fail `ids` in transport with a 503.
    pub fn with_unreachable(mut self, ids: &[&str]) -> Self {
        self.unreachable.extend(id_set(ids));
        self
    }

    /// Panic while submitting `ids`.
    pub fn with_panicking(mut self, ids: &[&str]) -> Self {
        self.panicking.extend(id_set(ids));
        self
    }

    /// Sleep for `latency` before answering `ids`, or every record when `ids`
    /// is empty.
    pub fn with_latency(mut self, latency: Duration, ids: &[&str]) -> Self {
        self.latency = latency;
        self.slow.extend(id_set(ids));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of submissions seen running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn answer(&self, id: &str) -> Result<RemoteOutcome, UpdateError> {
        if !self.latency.is_zero() && (self.slow.is_empty() || self.slow.contains(id)) {
            thread::sleep(self.latency);
        }
        if self.panicking.contains(id) {
            panic!("scripted panic for {id}");
        }
        if self.unreachable.contains(id) {
            return Err(UpdateError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        if self.rejected.contains(id) {
            return Ok(RemoteOutcome::failed_with_messages([format!("record {id} is invalid")]));
        }
        if self.duplicates.contains(id) {
            return Ok(RemoteOutcome {
                double_record_key: Some(format!("key-{id}")),
                double_record_entries: Some(vec!["already exists".to_string()]),
                ..RemoteOutcome::failed_with_messages(Vec::<String>::new())
            });
        }
        Ok(RemoteOutcome::ok())
    }
}

/// Leaves the in-flight count on every exit path, panics included.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RemoteUpdater for ScriptedUpdater {
    fn submit(
        &self,
        record: &Record,
        _metadata: &SubmissionMetadata,
    ) -> Result<RemoteOutcome, UpdateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(running, Ordering::SeqCst);

        self.answer(&record.identifier().record_id)
    }
}

/// Reporter remembering everything it is told.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<(RecordIdentifier, SubmissionOutcome)>>,
    drains: Mutex<Vec<JobSummary>>,
}

impl CollectingReporter {
    pub fn reports(&self) -> Vec<(RecordIdentifier, SubmissionOutcome)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn drains(&self) -> Vec<JobSummary> {
        self.drains.lock().unwrap().clone()
    }
}

impl OutcomeReporter for CollectingReporter {
    fn report(&self, id: &RecordIdentifier, outcome: &SubmissionOutcome) {
        self.reports.lock().unwrap().push((id.clone(), outcome.clone()));
    }

    fn batch_drained(&self, summary: &JobSummary) {
        self.drains.lock().unwrap().push(*summary);
    }
}
