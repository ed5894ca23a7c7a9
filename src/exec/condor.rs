// src/exec/condor.rs

//! HTCondor DAGMan adapter.
//!
//! Submission shells out to `condor_submit_dag`; supervision reads the
//! artifacts DAGMan leaves next to the DAG file instead of polling the
//! scheduler:
//!
//! - `<dag>.lock` exists while an instance is running,
//! - `<dag>.dagman.out` ends with `EXITING WITH STATUS <n>` once it is
//!   done,
//! - `<dag>.rescueNNN` files record partial failures, highest NNN most
//!   recent.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, TrigflowError};
use crate::exec::service::{ExecutionService, JobId, JobStatus};

const SUBMIT_EXECUTABLE: &str = "condor_submit_dag";

/// Production [`ExecutionService`] backed by HTCondor DAGMan.
#[derive(Debug, Clone)]
pub struct CondorService {
    submit_executable: PathBuf,
}

impl CondorService {
    pub fn new() -> Self {
        Self {
            submit_executable: PathBuf::from(SUBMIT_EXECUTABLE),
        }
    }

    /// Override the submit binary, for sites that wrap it.
    pub fn with_executable(submit_executable: PathBuf) -> Self {
        Self { submit_executable }
    }
}

impl Default for CondorService {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionService for CondorService {
    fn submit(
        &mut self,
        dag: PathBuf,
        rescue: bool,
    ) -> Pin<Box<dyn Future<Output = Result<JobId>> + Send + '_>> {
        let exe = self.submit_executable.clone();
        Box::pin(async move {
            let mut cmd = Command::new(&exe);
            // A rescue submission must keep the rescue artifacts in place;
            // -force would delete them and restart from scratch.
            if !rescue {
                cmd.arg("-force");
            }
            cmd.arg(&dag);

            debug!(dag = %dag.display(), rescue, "submitting workflow");
            let output = cmd.output().await?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(TrigflowError::Service(format!(
                    "{} exited with {}: {}",
                    exe.display(),
                    output.status,
                    stderr.trim()
                )));
            }

            let job = parse_cluster_id(&stdout).ok_or_else(|| {
                TrigflowError::Service(format!(
                    "no cluster id in submit output for {}",
                    dag.display()
                ))
            })?;
            info!(dag = %dag.display(), %job, rescue, "workflow submitted");
            Ok(job)
        })
    }

    fn status(
        &mut self,
        dag: PathBuf,
        _job: JobId,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus>> + Send + '_>> {
        Box::pin(async move {
            if lock_file(&dag).exists() {
                return Ok(JobStatus::Running);
            }
            let out_file = append_suffix(&dag, ".dagman.out");
            let text = match fs::read_to_string(&out_file) {
                Ok(text) => text,
                // The log appears shortly after submission; until then the
                // instance counts as running.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(JobStatus::Running);
                }
                Err(err) => return Err(err.into()),
            };
            match parse_exit_status(&text) {
                Some(0) => Ok(JobStatus::Succeeded),
                Some(code) => Ok(JobStatus::Failed(code)),
                None => Ok(JobStatus::Running),
            }
        })
    }

    fn find_rescue(
        &mut self,
        dag: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PathBuf>>> + Send + '_>> {
        Box::pin(async move { find_rescue_file(&dag) })
    }

    fn find_running(
        &mut self,
        dag: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<JobId>>> + Send + '_>> {
        Box::pin(async move {
            let lock = lock_file(&dag);
            if !lock.exists() {
                return Ok(None);
            }
            // DAGMan writes its process id into the lock file; fall back to
            // zero if the content is unreadable.
            let id = fs::read_to_string(&lock)
                .ok()
                .and_then(|text| first_integer(&text))
                .unwrap_or(0);
            Ok(Some(JobId(id)))
        })
    }
}

fn lock_file(dag: &Path) -> PathBuf {
    append_suffix(dag, ".lock")
}

/// `<dag>.rescueNNN` with the highest three-digit suffix, if any.
pub fn find_rescue_file(dag: &Path) -> Result<Option<PathBuf>> {
    let dir = dag.parent().unwrap_or_else(|| Path::new("."));
    let prefix = format!(
        "{}.rescue",
        dag.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    );

    let mut best: Option<(u32, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(suffix) = name.strip_prefix(&prefix) else {
            continue;
        };
        if suffix.len() != 3 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let number: u32 = suffix.parse().unwrap_or(0);
        if best.as_ref().is_none_or(|(n, _)| number > *n) {
            best = Some((number, entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Pull the cluster id out of `... submitted to cluster NNN.` output.
fn parse_cluster_id(stdout: &str) -> Option<JobId> {
    let idx = stdout.find("submitted to cluster")?;
    let rest = &stdout[idx + "submitted to cluster".len()..];
    first_integer(rest).map(JobId)
}

/// Exit code from the last `EXITING WITH STATUS <n>` line, if present.
fn parse_exit_status(log: &str) -> Option<i32> {
    log.lines()
        .rev()
        .find_map(|line| {
            let idx = line.find("EXITING WITH STATUS")?;
            line[idx + "EXITING WITH STATUS".len()..].trim().parse().ok()
        })
}

fn first_integer(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_id_from_submit_output() {
        let out = "Submitting job(s).\n1 job(s) submitted to cluster 5417823.\n";
        assert_eq!(parse_cluster_id(out), Some(JobId(5417823)));
        assert_eq!(parse_cluster_id("no such line"), None);
    }

    #[test]
    fn exit_status_from_log_tail() {
        let log = "... lots of output ...\n\
                   12/01 EXITING WITH STATUS 0\n";
        assert_eq!(parse_exit_status(log), Some(0));

        let log = "12/01 EXITING WITH STATUS 0\n12/02 EXITING WITH STATUS 2\n";
        assert_eq!(parse_exit_status(log), Some(2));
        assert_eq!(parse_exit_status("still going"), None);
    }

    #[test]
    fn rescue_scan_picks_highest() {
        let dir = tempfile::tempdir().unwrap();
        let dag = dir.path().join("trigflow-std.dag");
        std::fs::write(&dag, "").unwrap();
        assert_eq!(find_rescue_file(&dag).unwrap(), None);

        for suffix in ["rescue001", "rescue003", "rescue002", "rescueXYZ", "rescue03"] {
            std::fs::write(dir.path().join(format!("trigflow-std.dag.{suffix}")), "").unwrap();
        }
        let found = find_rescue_file(&dag).unwrap().unwrap();
        assert!(found.ends_with("trigflow-std.dag.rescue003"));
    }
}
