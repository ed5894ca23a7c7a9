// src/exec/service.rs

//! Pluggable execution service abstraction.
//!
//! Production code uses [`super::CondorService`]; tests provide their own
//! implementation that never touches a real scheduler. Methods take owned
//! arguments and return boxed futures so the trait stays object-safe and
//! implementations don't borrow `self` across awaits.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;

/// Scheduler-assigned identifier of a submitted workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse state of a submitted workflow, as far as the driver cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded,
    /// Terminal failure with the scheduler's exit code.
    Failed(i32),
}

/// Trait abstracting the external workflow scheduler.
pub trait ExecutionService: Send {
    /// Submit the workflow at `dag`. With `rescue` set the service resumes
    /// from the most recent rescue artifact instead of starting over.
    fn submit(
        &mut self,
        dag: PathBuf,
        rescue: bool,
    ) -> Pin<Box<dyn Future<Output = Result<JobId>> + Send + '_>>;

    /// Current state of a previously submitted workflow.
    fn status(
        &mut self,
        dag: PathBuf,
        job: JobId,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus>> + Send + '_>>;

    /// Most recent rescue artifact for `dag`, if any exists.
    fn find_rescue(
        &mut self,
        dag: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PathBuf>>> + Send + '_>>;

    /// Id of an instance of `dag` that is currently running, if any.
    fn find_running(
        &mut self,
        dag: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<JobId>>> + Send + '_>>;
}
