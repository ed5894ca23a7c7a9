// src/exec/driver.rs

//! Submit/poll/rescue loop around an [`ExecutionService`].

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::{Result, TrigflowError};
use crate::exec::service::{ExecutionService, JobId, JobStatus};
use crate::types::SubmitMode;

/// How often a running workflow is re-checked.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Decide how this run attaches to whatever state the scheduler already
/// holds for `dag`.
///
/// Exactly one of `rescue` and `reattach` may be set (the CLI enforces
/// this). A running instance without `reattach` is a hard collision; a
/// `reattach` request without a running instance degrades to a fresh run.
pub async fn resolve_mode<S: ExecutionService + ?Sized>(
    service: &mut S,
    dag: &Path,
    group: &str,
    rescue: bool,
    reattach: bool,
    force: bool,
) -> Result<SubmitMode> {
    if let Some(job) = service.find_running(dag.to_path_buf()).await? {
        if reattach {
            info!(%job, group, "reattaching to running workflow");
            return Ok(SubmitMode::Reattach);
        }
        return Err(TrigflowError::Collision {
            group: group.to_string(),
            detail: format!("workflow already running as job {job}"),
        });
    }
    if reattach {
        warn!(group, "no running workflow to reattach to, starting fresh");
        return Ok(SubmitMode::Fresh);
    }

    if rescue {
        match service.find_rescue(dag.to_path_buf()).await? {
            Some(artifact) => {
                info!(artifact = %artifact.display(), "rescuing from previous run");
                return Ok(SubmitMode::Rescue);
            }
            None => {
                return Err(TrigflowError::NoRescueArtifact(dag.display().to_string()));
            }
        }
    }

    // A leftover DAG file from a completed run is fine; only unconsumed
    // rescue artifacts mean there is a failed run to resume.
    if !force {
        if let Some(artifact) = service.find_rescue(dag.to_path_buf()).await? {
            return Err(TrigflowError::ConfigError(format!(
                "previous run left a rescue file at {}; pass --rescue to resume or --force to start over",
                artifact.display()
            )));
        }
    }
    Ok(SubmitMode::Fresh)
}

/// Drive one workflow to completion.
///
/// `on_first_submit` runs exactly once, right after the first successful
/// fresh submission; the caller uses it to advance the progress watermark
/// so a crash of this process never re-queues already-submitted work.
/// Failures are retried through rescue submissions up to
/// `max_rescue_attempts` times.
pub async fn run_workflow<S, F>(
    service: &mut S,
    dag: &Path,
    mode: SubmitMode,
    max_rescue_attempts: u32,
    poll_interval: Duration,
    mut on_first_submit: F,
) -> Result<()>
where
    S: ExecutionService + ?Sized,
    F: FnMut() -> Result<()>,
{
    let mut job = attach(service, dag, mode, &mut on_first_submit).await?;
    let mut attempt: u32 = 0;

    loop {
        match service.status(dag.to_path_buf(), job).await? {
            JobStatus::Running => tokio::time::sleep(poll_interval).await,
            JobStatus::Succeeded => {
                info!(%job, attempt, "workflow succeeded");
                return Ok(());
            }
            JobStatus::Failed(code) => {
                if attempt >= max_rescue_attempts {
                    return Err(TrigflowError::WorkflowFailedPermanently {
                        code,
                        attempts: attempt + 1,
                    });
                }
                attempt += 1;
                let artifact = service
                    .find_rescue(dag.to_path_buf())
                    .await?
                    .ok_or_else(|| TrigflowError::NoRescueArtifact(dag.display().to_string()))?;
                warn!(
                    %job,
                    code,
                    attempt,
                    artifact = %artifact.display(),
                    "workflow failed, submitting rescue"
                );
                job = service.submit(dag.to_path_buf(), true).await?;
            }
        }
    }
}

async fn attach<S, F>(
    service: &mut S,
    dag: &Path,
    mode: SubmitMode,
    on_first_submit: &mut F,
) -> Result<JobId>
where
    S: ExecutionService + ?Sized,
    F: FnMut() -> Result<()>,
{
    match mode {
        SubmitMode::Fresh => {
            let job = service.submit(dag.to_path_buf(), false).await?;
            on_first_submit()?;
            Ok(job)
        }
        SubmitMode::Rescue => service.submit(dag.to_path_buf(), true).await,
        SubmitMode::Reattach => match service.find_running(dag.to_path_buf()).await? {
            Some(job) => Ok(job),
            // The instance finished between preflight and now; fall back to
            // a fresh submission.
            None => {
                let job = service.submit(dag.to_path_buf(), false).await?;
                on_first_submit()?;
                Ok(job)
            }
        },
    }
}
