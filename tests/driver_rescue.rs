// tests/driver_rescue.rs

mod common;
use common::init_tracing;

use std::time::Duration;

use trigflow::errors::TrigflowError;
use trigflow::exec::{resolve_mode, run_workflow, JobId, JobStatus};
use trigflow::types::SubmitMode;
use trigflow_test_utils::fake_service::FakeExecutionService;
use trigflow_test_utils::with_timeout;

const POLL: Duration = Duration::from_millis(1);

#[tokio::test]
async fn fresh_run_writes_watermark_after_submission() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new();
    let events = service.events();
    let watermark_events = events.clone();

    with_timeout(run_workflow(&mut service, &dag, SubmitMode::Fresh, 0, POLL, || {
        watermark_events.lock().unwrap().push("watermark".to_string());
        Ok(())
    }))
    .await
    .unwrap();

    let log = events.lock().unwrap();
    assert!(log[0].starts_with("submit fresh"), "got {:?}", *log);
    assert_eq!(log[1], "watermark");
    assert!(log.last().unwrap().contains("Succeeded"));
}

#[tokio::test]
async fn polling_waits_out_a_running_workflow() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new().with_statuses(&[
        JobStatus::Running,
        JobStatus::Running,
        JobStatus::Succeeded,
    ]);
    let events = service.events();

    with_timeout(run_workflow(&mut service, &dag, SubmitMode::Fresh, 0, POLL, || Ok(())))
        .await
        .unwrap();

    let polls = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("status"))
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn rescue_budget_bounds_resubmissions() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new()
        .with_statuses(&[
            JobStatus::Failed(1),
            JobStatus::Failed(1),
            JobStatus::Failed(1),
        ])
        .with_rescue_artifact(dir.path().join("flow.dag.rescue001"));
    let events = service.events();

    let err = with_timeout(run_workflow(&mut service, &dag, SubmitMode::Fresh, 2, POLL, || Ok(())))
        .await
        .unwrap_err();

    match err {
        TrigflowError::WorkflowFailedPermanently { code, attempts } => {
            assert_eq!(code, 1);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected WorkflowFailedPermanently, got {other:?}"),
    }

    let log = events.lock().unwrap();
    let rescues = log.iter().filter(|e| e.starts_with("submit rescue")).count();
    assert_eq!(rescues, 2);
}

#[tokio::test]
async fn failure_without_rescue_artifact_is_an_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new().with_statuses(&[JobStatus::Failed(2)]);

    let err = with_timeout(run_workflow(&mut service, &dag, SubmitMode::Fresh, 1, POLL, || Ok(())))
        .await
        .unwrap_err();
    assert!(matches!(err, TrigflowError::NoRescueArtifact(_)));
}

#[tokio::test]
async fn running_instance_without_reattach_is_a_collision() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new().with_running(JobId(7));

    let err = resolve_mode(&mut service, &dag, "std", false, false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, TrigflowError::Collision { .. }));
}

#[tokio::test]
async fn reattach_follows_the_running_instance() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new().with_running(JobId(7));
    let events = service.events();

    let mode = resolve_mode(&mut service, &dag, "std", false, true, false)
        .await
        .unwrap();
    assert_eq!(mode, SubmitMode::Reattach);

    with_timeout(run_workflow(&mut service, &dag, mode, 0, POLL, || {
        panic!("reattach must not advance the watermark");
    }))
    .await
    .unwrap();

    let log = events.lock().unwrap();
    assert!(log.iter().all(|e| !e.starts_with("submit")));
    assert!(log.iter().any(|e| e.contains("status 7")));
}

#[tokio::test]
async fn reattach_without_running_instance_degrades_to_fresh() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new();

    let mode = resolve_mode(&mut service, &dag, "std", false, true, false)
        .await
        .unwrap();
    assert_eq!(mode, SubmitMode::Fresh);
}

#[tokio::test]
async fn rescue_requires_an_artifact() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");

    let mut service = FakeExecutionService::new();
    let err = resolve_mode(&mut service, &dag, "std", true, false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, TrigflowError::NoRescueArtifact(_)));

    let mut service =
        FakeExecutionService::new().with_rescue_artifact(dir.path().join("flow.dag.rescue001"));
    let mode = resolve_mode(&mut service, &dag, "std", true, false, false)
        .await
        .unwrap();
    assert_eq!(mode, SubmitMode::Rescue);
}

#[tokio::test]
async fn rescue_submission_does_not_touch_the_watermark() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    let mut service = FakeExecutionService::new();
    let events = service.events();

    with_timeout(run_workflow(&mut service, &dag, SubmitMode::Rescue, 0, POLL, || {
        panic!("rescue must not advance the watermark");
    }))
    .await
    .unwrap();

    assert!(events.lock().unwrap()[0].starts_with("submit rescue"));
}

#[tokio::test]
async fn leftover_dag_file_does_not_block_a_fresh_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");
    // A completed run leaves the DAG file behind; the next scheduled run
    // must start fresh without any override.
    std::fs::write(&dag, "JOB a a.sub\n").unwrap();

    let mut service = FakeExecutionService::new();
    let mode = resolve_mode(&mut service, &dag, "std", false, false, false)
        .await
        .unwrap();
    assert_eq!(mode, SubmitMode::Fresh);
}

#[tokio::test]
async fn leftover_rescue_artifacts_require_rescue_or_force() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dag = dir.path().join("flow.dag");

    let mut service =
        FakeExecutionService::new().with_rescue_artifact(dir.path().join("flow.dag.rescue001"));
    let err = resolve_mode(&mut service, &dag, "std", false, false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, TrigflowError::ConfigError(_)));

    let mode = resolve_mode(&mut service, &dag, "std", false, false, true)
        .await
        .unwrap();
    assert_eq!(mode, SubmitMode::Fresh);
}
