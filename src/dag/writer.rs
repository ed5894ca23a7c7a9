// src/dag/writer.rs

//! Serialize a [`CompiledWorkflow`] to the execution service's on-disk
//! submit format: one DAG description, one submit file per node category,
//! the generated shell scripts and the per-group parameter files.

use std::fmt::Write as _;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ProcessingRequest;
use crate::dag::compiler::CompiledWorkflow;
use crate::dag::graph::{GraphNode, NodeCategory};
use crate::errors::Result;

/// Render the DAG description.
pub fn render_dag(workflow: &CompiledWorkflow, req: &ProcessingRequest) -> String {
    let mut out = String::new();

    for (_, node) in workflow.graph.iter() {
        let sub = sub_file(req, node.category);
        writeln!(out, "JOB {} {}", node.name, sub.display()).unwrap();
        match node.category {
            NodeCategory::Primary => {
                writeln!(
                    out,
                    "VARS {} start=\"{}\" end=\"{}\" parameters=\"{}\"",
                    node.name, node.arguments[0], node.arguments[1], node.arguments[2]
                )
                .unwrap();
            }
            _ => {
                writeln!(out, "VARS {} script=\"{}\"", node.name, node.arguments[0]).unwrap();
            }
        }
        if node.retry > 0 {
            writeln!(out, "RETRY {} {}", node.name, node.retry).unwrap();
        }
        // A successful post script overrides the node's own exit status, so
        // a failed chunk does not abort the rest of the workflow.
        if node.swallow_failure {
            writeln!(out, "SCRIPT POST {} /bin/true", node.name).unwrap();
        }
        writeln!(out, "CATEGORY {} {}", node.name, node.category.as_str()).unwrap();
    }

    for (_, node) in workflow.graph.iter() {
        if node.parents.is_empty() {
            continue;
        }
        let parents: Vec<&str> = node
            .parents
            .iter()
            .map(|p| workflow.graph.node(*p).name.as_str())
            .collect();
        writeln!(out, "PARENT {} CHILD {}", parents.join(" "), node.name).unwrap();
    }

    out
}

/// Render the submit file shared by all nodes of one category.
///
/// Hold and removal policies are uniform within a category, so they are
/// taken from the first node carrying them.
pub fn render_sub(req: &ProcessingRequest, category: NodeCategory, template: &GraphNode) -> String {
    let mut out = String::new();

    writeln!(out, "universe = vanilla").unwrap();
    writeln!(out, "executable = {}", template.executable.display()).unwrap();
    match category {
        NodeCategory::Primary => {
            writeln!(out, "arguments = \"$(start) $(end) $(parameters)\"").unwrap();
        }
        _ => {
            writeln!(out, "arguments = \"$(script)\"").unwrap();
        }
    }
    writeln!(out, "getenv = True").unwrap();
    writeln!(
        out,
        "log = {}",
        req.dirs.logs.join(format!("trigflow-{}.log", category.as_str())).display()
    )
    .unwrap();
    writeln!(
        out,
        "error = {}",
        req.dirs.logs.join("$(Cluster)-$(Process).err").display()
    )
    .unwrap();
    writeln!(
        out,
        "output = {}",
        req.dirs.logs.join("$(Cluster)-$(Process).out").display()
    )
    .unwrap();
    if let Some(cond) = &template.release_condition {
        writeln!(out, "periodic_release = {cond}").unwrap();
    }
    if let Some(cond) = &template.remove_condition {
        writeln!(out, "periodic_remove = {cond}").unwrap();
    }
    writeln!(out, "notification = Never").unwrap();
    writeln!(out, "queue 1").unwrap();

    out
}

/// Write the workflow to disk and return the DAG path.
///
/// Only fresh runs call this; rescue and reattach operate on the files a
/// previous run already wrote.
pub fn write_all(workflow: &CompiledWorkflow, req: &ProcessingRequest) -> Result<PathBuf> {
    fs::write(&workflow.dag_path, render_dag(workflow, req))?;
    debug!(path = %workflow.dag_path.display(), "wrote workflow description");

    for category in [
        NodeCategory::Primary,
        NodeCategory::PostProcess,
        NodeCategory::Archive,
        NodeCategory::Cleanup,
    ] {
        let ids = workflow.graph.ids_by_category(category);
        let Some(first) = ids.first() else { continue };
        let template = workflow.graph.node(*first);
        fs::write(sub_file(req, category), render_sub(req, category, template))?;
    }

    for (path, content) in &workflow.scripts {
        write_executable(path, content)?;
    }
    for (path, content) in &workflow.parameter_files {
        fs::write(path, content)?;
    }

    info!(
        dag = %workflow.dag_path.display(),
        scripts = workflow.scripts.len(),
        parameter_files = workflow.parameter_files.len(),
        "workflow written"
    );
    Ok(workflow.dag_path.clone())
}

fn sub_file(req: &ProcessingRequest, category: NodeCategory) -> PathBuf {
    req.dirs.condor.join(format!("trigflow-{}.sub", category.as_str()))
}

fn write_executable(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}
