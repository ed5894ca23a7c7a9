#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use trigflow::errors::Result;
use trigflow::exec::{ExecutionService, JobId, JobStatus};

/// Scripted `ExecutionService` for driver tests.
///
/// The test queues up the statuses the driver will observe, in order;
/// once the queue is empty every further poll reports success. Each call
/// is recorded in `events` so tests can assert on ordering (for example
/// that the watermark write happens after submission).
pub struct FakeExecutionService {
    statuses: VecDeque<JobStatus>,
    rescue_artifact: Option<PathBuf>,
    running: Option<JobId>,
    next_job: u64,
    events: Arc<Mutex<Vec<String>>>,
}

impl FakeExecutionService {
    pub fn new() -> Self {
        Self {
            statuses: VecDeque::new(),
            rescue_artifact: None,
            running: None,
            next_job: 100,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_statuses(mut self, statuses: &[JobStatus]) -> Self {
        self.statuses = statuses.iter().copied().collect();
        self
    }

    pub fn with_rescue_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.rescue_artifact = Some(path.into());
        self
    }

    pub fn with_running(mut self, job: JobId) -> Self {
        self.running = Some(job);
        self
    }

    /// Shared handle to the recorded call log.
    pub fn events(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.events)
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Default for FakeExecutionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionService for FakeExecutionService {
    fn submit(
        &mut self,
        _dag: PathBuf,
        rescue: bool,
    ) -> Pin<Box<dyn Future<Output = Result<JobId>> + Send + '_>> {
        let job = JobId(self.next_job);
        self.next_job += 1;
        self.record(format!(
            "submit {} -> {job}",
            if rescue { "rescue" } else { "fresh" }
        ));
        Box::pin(async move { Ok(job) })
    }

    fn status(
        &mut self,
        _dag: PathBuf,
        job: JobId,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus>> + Send + '_>> {
        let status = self.statuses.pop_front().unwrap_or(JobStatus::Succeeded);
        self.record(format!("status {job} -> {status:?}"));
        Box::pin(async move { Ok(status) })
    }

    fn find_rescue(
        &mut self,
        _dag: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PathBuf>>> + Send + '_>> {
        self.record("find_rescue".to_string());
        let artifact = self.rescue_artifact.clone();
        Box::pin(async move { Ok(artifact) })
    }

    fn find_running(
        &mut self,
        _dag: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<JobId>>> + Send + '_>> {
        self.record("find_running".to_string());
        let running = self.running;
        Box::pin(async move { Ok(running) })
    }
}
