// src/lib.rs

//! trigflow: gravitational-wave trigger-generation pipeline orchestrator.
//!
//! One run of [`run`] takes a channel group through the full pipeline:
//! decide the GPS segments to process ([`segments`]), cut them into work
//! units ([`partition`]), compile the workflow DAG ([`dag`]) and drive it
//! through the external execution service ([`exec`]).

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod partition;
pub mod segments;
pub mod types;

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::ProcessingRequest;
use crate::dag::compiler::CompiledWorkflow;
use crate::errors::{Result, TrigflowError};
use crate::exec::CondorService;
use crate::partition::Partition;
use crate::segments::{
    FileBackedProvider, Outcome, RetryingProvider, Segment, SegmentPlan, WatermarkStore,
};
use crate::types::SubmitMode;

/// Execute one processing run end to end.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = config::load_and_validate(&args.config_file)?;
    let req = ProcessingRequest::from_cli(&args, &cfg)?;
    req.dirs.create()?;

    let cache_file = args.cache_file.clone().ok_or_else(|| {
        TrigflowError::ConfigError("--cache-file is required to locate frame data".to_string())
    })?;
    let provider = RetryingProvider::new(FileBackedProvider::new(
        cache_file.clone(),
        args.state_segments_file.clone(),
    ));
    let store = WatermarkStore::new(req.dirs.watermark_file());
    let mut service = CondorService::new();
    let dag_path = req.dirs.dag_file(&req.group);

    // A dry run never touches the scheduler, so skip preflight and pretend
    // this is a fresh submission.
    let mode = if args.dry_run {
        SubmitMode::Fresh
    } else {
        exec::resolve_mode(
            &mut service,
            &dag_path,
            &req.group,
            args.rescue,
            args.reattach,
            args.force,
        )
        .await?
    };
    let fresh = mode == SubmitMode::Fresh;

    let watermark = store.read()?;
    let outcome = match segments::determine_segments(&req, &provider, watermark, fresh) {
        // Online runs treat missing data as "not yet", not as failure.
        Err(TrigflowError::DataUnavailable(reason)) if req.mode().is_online() => {
            info!(group = %req.group, reason, "data not available yet");
            clean_empty_dirs(&req);
            return Ok(());
        }
        other => other?,
    };
    let plan = match outcome {
        Outcome::RetryLater { reason } => {
            info!(group = %req.group, reason, "nothing to process yet");
            clean_empty_dirs(&req);
            return Ok(());
        }
        Outcome::CaughtUp { span } => {
            store.write(span)?;
            info!(group = %req.group, %span, "no analysable segments, watermark advanced");
            clean_empty_dirs(&req);
            return Ok(());
        }
        Outcome::Ready(plan) => plan,
    };

    let parts = partition::partition(&req, &plan)?;
    let workflow = dag::compile(&req, &plan, &parts)?;

    if args.dry_run {
        print_plan(&plan, &parts, &workflow);
        return Ok(());
    }

    // Rescue and reattach recompile purely in memory; the files on disk
    // belong to the run being resumed.
    if fresh {
        // Jobs read the frame cache from inside the run directory, so the
        // run stays self-contained once submitted.
        fs::copy(&cache_file, req.dirs.cache.join("frames.lcf"))?;
        dag::writer::write_all(&workflow, &req)?;
    }

    let online = req.mode().is_online();
    if args.no_submit {
        info!(dag = %workflow.dag_path.display(), "workflow written, submission skipped");
        if fresh && online {
            store.write(plan.extent)?;
        }
        return Ok(());
    }

    let extent = plan.extent;
    exec::run_workflow(
        &mut service,
        &dag_path,
        mode,
        req.max_rescue_attempts,
        exec::driver::POLL_INTERVAL,
        || {
            if online {
                store.write(extent)?;
            }
            Ok(())
        },
    )
    .await?;

    archive_bookkeeping(&req, &dag_path, extent)?;
    info!(group = %req.group, %extent, "processing complete");
    Ok(())
}

/// Log the compiled plan without executing anything.
fn print_plan(plan: &SegmentPlan, parts: &Partition, workflow: &CompiledWorkflow) {
    info!(span = %plan.data_span, extent = %plan.extent, "dry run plan");
    for segment in &plan.segments {
        info!(%segment, "processing segment");
    }
    info!(
        groups = parts.groups.len(),
        units = parts.units.len(),
        nodes = workflow.graph.len(),
        dag = %workflow.dag_path.display(),
        "compiled workflow"
    );
}

/// Keep the bookkeeping of a finished run next to its logs, stamped with
/// the processed span so successive online runs do not overwrite it.
fn archive_bookkeeping(req: &ProcessingRequest, dag_path: &Path, extent: Segment) -> Result<()> {
    let stub = format!("{}-{}", extent.start, extent.end);
    let watermark = req.dirs.watermark_file();
    let dagman_out = {
        let mut os = dag_path.as_os_str().to_os_string();
        os.push(".dagman.out");
        std::path::PathBuf::from(os)
    };

    for (file, keep_original) in [(dagman_out.as_path(), false), (watermark.as_path(), true)] {
        if !file.exists() {
            continue;
        }
        let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let stamped = match name.split_once('.') {
            Some((base, rest)) => format!("{base}.{stub}.{rest}"),
            None => format!("{name}.{stub}"),
        };
        let target = req.dirs.logs.join(stamped);
        if keep_original {
            fs::copy(file, &target)?;
        } else {
            fs::rename(file, &target)?;
        }
        debug!(from = %file.display(), to = %target.display(), "archived bookkeeping file");
    }
    Ok(())
}

/// Remove run directories we created that ended up empty, deepest first.
fn clean_empty_dirs(req: &ProcessingRequest) {
    for dir in req.dirs.subdirs() {
        remove_if_empty(dir);
    }
    remove_if_empty(&req.dirs.root);
}

fn remove_if_empty(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    let mut empty = true;
    for entry in entries.flatten() {
        let path = entry.path();
        if !(path.is_dir() && remove_if_empty(&path)) {
            empty = false;
        }
    }
    empty && fs::remove_dir(dir).is_ok()
}
