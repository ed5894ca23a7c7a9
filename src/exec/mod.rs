// src/exec/mod.rs

//! Submission and supervision of compiled workflows.
//!
//! The driver talks to an [`ExecutionService`] instead of the scheduler
//! directly, so tests can swap in a scripted fake while production uses
//! the [`condor`] adapter.

pub mod condor;
pub mod driver;
pub mod service;

pub use condor::CondorService;
pub use driver::{resolve_mode, run_workflow};
pub use service::{ExecutionService, JobId, JobStatus};
