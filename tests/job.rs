//! End-to-end jobs: sniff, read and dispatch with a scripted service.

mod common;

use common::{danmarc2_lines, iso_danmarc_record, marcxchange_collection, CollectingReporter, ScriptedUpdater};
use marc_update::dispatch::{DispatchError, JobSummary};
use marc_update::job::{run_job, JobError};
use marc_update::JobConfig;
use std::fs::File;
use std::io::{Cursor, Write};
use std::sync::Arc;

fn config() -> JobConfig {
    JobConfig {
        endpoint: "http://localhost:8080/UpdateService/2.0".to_string(),
        worker_count: 2,
        batch_size: 5,
        ..JobConfig::default()
    }
}

#[test]
fn test_job_over_file() {
    let ids: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(danmarc2_lines(&id_refs).as_bytes()).unwrap();
    let input = File::open(file.path()).unwrap();
    let len = input.metadata().unwrap().len();

    let updater = Arc::new(ScriptedUpdater::rejecting(&["7"]));
    let reporter = Arc::new(CollectingReporter::default());
    let summary = run_job(&config(), input, Some(len), Arc::clone(&updater), Arc::clone(&reporter)).unwrap();

    assert_eq!(
        summary,
        JobSummary {
            total: 12,
            success: 11,
            error: 1
        }
    );
    assert_eq!(reporter.drains().len(), 3);
    assert_eq!(reporter.reports()[0].0.to_string(), "7:870970");
}

#[test]
fn test_job_over_tiny_input_caps_sample() {
    let data = marcxchange_collection(&["1"]).into_bytes();
    let len = data.len() as u64;
    let updater = Arc::new(ScriptedUpdater::accepting());

    let summary = run_job(
        &config(),
        Cursor::new(data),
        Some(len),
        Arc::clone(&updater),
        CollectingReporter::default(),
    )
    .unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(updater.calls(), 1);
}

#[test]
fn test_job_over_iso2709_aborts_on_error_limit() {
    let mut data = Vec::new();
    for id in 1..=10 {
        data.extend(iso_danmarc_record(&id.to_string(), "870970", "Title"));
    }
    let job = JobConfig {
        error_limit: 0,
        worker_count: 1,
        ..config()
    };

    let err = run_job(
        &job,
        Cursor::new(data),
        None,
        ScriptedUpdater::rejecting(&["3"]),
        CollectingReporter::default(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        JobError::Dispatch(DispatchError::ErrorLimitExceeded { .. })
    ));
    assert_eq!(
        err.summary(),
        Some(JobSummary {
            total: 3,
            success: 2,
            error: 1
        })
    );
}

#[test]
fn test_invalid_config_fails_before_reading() {
    let job = JobConfig {
        endpoint: String::new(),
        ..config()
    };
    let updater = Arc::new(ScriptedUpdater::accepting());

    let err = run_job(
        &job,
        Cursor::new(danmarc2_lines(&["1"]).into_bytes()),
        None,
        Arc::clone(&updater),
        CollectingReporter::default(),
    )
    .unwrap_err();

    assert!(matches!(err, JobError::Config(_)));
    assert!(err.summary().is_none());
    assert_eq!(updater.calls(), 0);
}

#[test]
fn test_empty_input_completes() {
    let summary = run_job(
        &config(),
        Cursor::new(Vec::new()),
        Some(0),
        ScriptedUpdater::accepting(),
        CollectingReporter::default(),
    )
    .unwrap();
    assert_eq!(summary, JobSummary::default());
}
