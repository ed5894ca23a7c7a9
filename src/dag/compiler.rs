// src/dag/compiler.rs

//! Workflow compiler: segment plan + partition -> executable DAG.
//!
//! Node creation order is segment-major (matching the partitioner's unit
//! order), with each channel group's post-process node created right after
//! that group's primaries. Identical inputs always compile to the same
//! node count, ordering and edge set; rescue mode relies on this to
//! recompile a workflow in memory that matches the one on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::ProcessingRequest;
use crate::dag::graph::{GraphNode, NodeCategory, NodeId, WorkflowGraph};
use crate::dag::script::{self, ScriptOp};
use crate::errors::Result;
use crate::partition::{render_parameter_file, sanitize_channel, Partition};
use crate::segments::{Segment, SegmentPlan};
use crate::types::OutputFormat;

/// Policy under which the service releases a held node for another attempt.
const RELEASE_CONDITION: &str =
    "(HoldReasonCode =?= 26 || HoldReasonCode =?= 34) && (JobStatus == 5)";
/// Policy under which the service removes a runaway node.
const REMOVE_CONDITION: &str = "(JobStatus == 1) && MemoryUsage >= 7G";

/// A compiled workflow: the graph plus every file the run writes to disk
/// in fresh mode (rescue recompiles this in memory and writes nothing).
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    pub graph: WorkflowGraph,
    /// Where the serialized workflow lives (or would live, in rescue mode).
    pub dag_path: PathBuf,
    /// Generated shell scripts, keyed by path.
    pub scripts: BTreeMap<PathBuf, String>,
    /// Parameter files for the processing executable, keyed by path.
    pub parameter_files: BTreeMap<PathBuf, String>,
}

/// Compile the workflow graph for one run.
pub fn compile(
    req: &ProcessingRequest,
    plan: &SegmentPlan,
    partition: &Partition,
) -> Result<CompiledWorkflow> {
    let mut graph = WorkflowGraph::new();
    let mut scripts = BTreeMap::new();
    let mut all_primaries: Vec<NodeId> = Vec::new();
    let mut pp_nodes: Vec<NodeId> = Vec::new();
    let mut rm_files: Vec<PathBuf> = Vec::new();

    for segment in &plan.segments {
        for group in &partition.groups {
            let units = partition.units_for(*segment, group.index);

            // Outputs of this (group, segment) pairing keyed by channel and
            // format; the post-process node merges exactly these.
            let mut produced: BTreeMap<(String, OutputFormat), Vec<PathBuf>> = BTreeMap::new();
            let mut seg_primaries = Vec::new();

            for unit in &units {
                for ((chan, fmt), files) in &unit.outputs {
                    produced
                        .entry((chan.clone(), *fmt))
                        .or_default()
                        .extend(files.iter().cloned());
                }
                if req.merge.skip_processing {
                    continue;
                }
                let id = graph.add_node(GraphNode {
                    name: format!("process_g{}_{}_{}", group.index, unit.span.start, unit.span.end),
                    category: NodeCategory::Primary,
                    retry: req.retry,
                    parents: Vec::new(),
                    executable: req.executable.clone(),
                    arguments: vec![
                        unit.span.start.to_string(),
                        unit.span.end.to_string(),
                        unit.parameter_file.display().to_string(),
                    ],
                    inputs: Vec::new(),
                    outputs: unit.outputs.values().flatten().cloned().collect(),
                    swallow_failure: true,
                    release_condition: Some(RELEASE_CONDITION.to_string()),
                    remove_condition: Some(REMOVE_CONDITION.to_string()),
                });
                seg_primaries.push(id);
                all_primaries.push(id);
            }

            let pp = post_process_node(
                req,
                &mut graph,
                &mut scripts,
                &mut rm_files,
                group.index,
                &group.channels,
                *segment,
                &produced,
                seg_primaries,
            );
            pp_nodes.push(pp);
        }
    }

    wave_ladder(&mut graph, &all_primaries, req.max_concurrent);

    let archive_node = if req.archive {
        Some(archive_node(req, &mut graph, &mut scripts, &pp_nodes))
    } else {
        None
    };

    if !req.merge.skip_rm {
        cleanup_node(req, &mut graph, &mut scripts, &pp_nodes, archive_node, rm_files);
    }

    let mut parameter_files = BTreeMap::new();
    for group in &partition.groups {
        parameter_files.insert(group.parameter_file.clone(), render_parameter_file(req, group));
    }

    graph.validate()?;
    info!(
        nodes = graph.len(),
        primaries = all_primaries.len(),
        segments = plan.segments.len(),
        "workflow compiled"
    );

    Ok(CompiledWorkflow {
        graph,
        dag_path: req.dirs.dag_file(&req.group),
        scripts,
        parameter_files,
    })
}

/// Build the post-process node for one (channel group, segment) pairing.
#[allow(clippy::too_many_arguments)]
fn post_process_node(
    req: &ProcessingRequest,
    graph: &mut WorkflowGraph,
    scripts: &mut BTreeMap<PathBuf, String>,
    rm_files: &mut Vec<PathBuf>,
    group_index: usize,
    channels: &[String],
    segment: Segment,
    produced: &BTreeMap<(String, OutputFormat), Vec<PathBuf>>,
    parents: Vec<NodeId>,
) -> NodeId {
    let mut ops = Vec::new();
    let mut inputs = Vec::new();

    for chan in channels {
        let merge_dir = req.dirs.merge.join(sanitize_channel(chan));
        for fmt in &req.output_formats {
            let Some(files) = produced.get(&(chan.clone(), *fmt)) else {
                continue;
            };
            inputs.extend(files.iter().cloned());
            match fmt {
                OutputFormat::Root | OutputFormat::Hdf5 | OutputFormat::Xml => {
                    ops.push(ScriptOp::Merge {
                        format: *fmt,
                        no_merge: req.merge.merge_skipped(*fmt),
                        no_gzip: *fmt == OutputFormat::Xml && req.merge.skip_gzip,
                        out_dir: merge_dir.clone(),
                        inputs: files.clone(),
                    });
                    rm_files.extend(files.iter().cloned());
                }
                // Text files are never merged; they are only removed once
                // archived.
                OutputFormat::Txt => {
                    if req.archive {
                        rm_files.extend(files.iter().cloned());
                    }
                }
            }
        }
    }

    let script_path = req.dirs.condor.join(format!(
        "post-process-{}-{}-{}.sh",
        group_index, segment.start, segment.end
    ));
    let mut header = vec![
        "trigflow post-processing".to_string(),
        format!("group: {}", req.group),
        format!("segment: {segment}"),
        "channels:".to_string(),
    ];
    header.extend(channels.iter().map(|c| format!("  {c}")));
    scripts.insert(script_path.clone(), script::render(&header, &ops));

    debug!(
        group = group_index,
        %segment,
        operations = ops.len(),
        "post-process node compiled"
    );

    graph.add_node(GraphNode {
        name: format!("merge_g{}_{}_{}", group_index, segment.start, segment.end),
        category: NodeCategory::PostProcess,
        retry: req.retry,
        parents,
        executable: PathBuf::from("/bin/bash"),
        arguments: vec![script_path.display().to_string()],
        inputs,
        outputs: Vec::new(),
        swallow_failure: false,
        release_condition: Some(RELEASE_CONDITION.to_string()),
        remove_condition: Some(REMOVE_CONDITION.to_string()),
    })
}

/// Assign primaries to successive waves of `max_concurrent` nodes; every
/// node of wave k+1 depends on every node of wave k. This caps the number
/// of simultaneously runnable primaries without serializing the run.
fn wave_ladder(graph: &mut WorkflowGraph, primaries: &[NodeId], max_concurrent: usize) {
    let maxcon = max_concurrent.max(1);
    let mut parents: Vec<NodeId> = Vec::new();
    let mut children: Vec<NodeId> = Vec::new();

    for &j in primaries {
        if parents.len() < maxcon {
            parents.push(j);
        } else if children.len() < maxcon {
            children.push(j);
        } else {
            for &p in &parents {
                for &c in &children {
                    graph.add_parent(c, p);
                }
            }
            parents = std::mem::take(&mut children);
            children.push(j);
        }
    }
    if !children.is_empty() && !parents.is_empty() {
        for &p in &parents {
            for &c in &children {
                graph.add_parent(c, p);
            }
        }
    }
}

/// Archival runs only after every merge across every channel and segment.
fn archive_node(
    req: &ProcessingRequest,
    graph: &mut WorkflowGraph,
    scripts: &mut BTreeMap<PathBuf, String>,
    pp_nodes: &[NodeId],
) -> NodeId {
    let script_path = req.dirs.condor.join("archive.sh");
    let header = vec![
        "trigflow archive".to_string(),
        format!("group: {}", req.group),
    ];
    let ops = vec![ScriptOp::Archive {
        in_dir: req.dirs.merge.clone(),
    }];
    scripts.insert(script_path.clone(), script::render(&header, &ops));

    graph.add_node(GraphNode {
        name: "archive".to_string(),
        category: NodeCategory::Archive,
        retry: req.retry,
        parents: pp_nodes.to_vec(),
        executable: PathBuf::from("/bin/bash"),
        arguments: vec![script_path.display().to_string()],
        inputs: Vec::new(),
        outputs: Vec::new(),
        swallow_failure: false,
        release_condition: Some(RELEASE_CONDITION.to_string()),
        remove_condition: Some(REMOVE_CONDITION.to_string()),
    })
}

/// Remove per-chunk intermediates once nothing depends on them any more.
fn cleanup_node(
    req: &ProcessingRequest,
    graph: &mut WorkflowGraph,
    scripts: &mut BTreeMap<PathBuf, String>,
    pp_nodes: &[NodeId],
    archive: Option<NodeId>,
    rm_files: Vec<PathBuf>,
) -> NodeId {
    let script_path = req.dirs.condor.join("post-process-rm.sh");
    let header = vec![
        "trigflow cleanup".to_string(),
        format!("group: {}", req.group),
    ];
    let ops = vec![ScriptOp::Remove {
        files: rm_files.clone(),
    }];
    scripts.insert(script_path.clone(), script::render(&header, &ops));

    let parents = match archive {
        Some(id) => vec![id],
        None => pp_nodes.to_vec(),
    };
    graph.add_node(GraphNode {
        name: "post_process_rm".to_string(),
        category: NodeCategory::Cleanup,
        retry: 0,
        parents,
        executable: PathBuf::from("/bin/bash"),
        arguments: vec![script_path.display().to_string()],
        inputs: rm_files,
        outputs: Vec::new(),
        swallow_failure: false,
        release_condition: None,
        remove_condition: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder_graph(n: usize) -> (WorkflowGraph, Vec<NodeId>) {
        let mut graph = WorkflowGraph::new();
        let ids: Vec<NodeId> = (0..n)
            .map(|i| {
                graph.add_node(GraphNode {
                    name: format!("p{i}"),
                    category: NodeCategory::Primary,
                    retry: 0,
                    parents: Vec::new(),
                    executable: PathBuf::from("/bin/true"),
                    arguments: Vec::new(),
                    inputs: Vec::new(),
                    outputs: Vec::new(),
                    swallow_failure: true,
                    release_condition: None,
                    remove_condition: None,
                })
            })
            .collect();
        (graph, ids)
    }

    #[test]
    fn ladder_links_only_adjacent_waves() {
        let (mut graph, ids) = ladder_graph(6);
        wave_ladder(&mut graph, &ids, 2);

        // Waves: [0,1], [2,3], [4,5]. Each node of a wave depends on every
        // node of the previous wave, and nothing else.
        assert_eq!(graph.node(ids[2]).parents, vec![ids[0], ids[1]]);
        assert_eq!(graph.node(ids[3]).parents, vec![ids[0], ids[1]]);
        assert_eq!(graph.node(ids[4]).parents, vec![ids[2], ids[3]]);
        assert_eq!(graph.node(ids[5]).parents, vec![ids[2], ids[3]]);
        assert!(graph.node(ids[0]).parents.is_empty());
        assert!(graph.node(ids[1]).parents.is_empty());
    }

    #[test]
    fn ladder_with_partial_final_wave() {
        let (mut graph, ids) = ladder_graph(5);
        wave_ladder(&mut graph, &ids, 2);

        assert_eq!(graph.node(ids[4]).parents, vec![ids[2], ids[3]]);
    }

    #[test]
    fn ladder_noop_when_under_limit() {
        let (mut graph, ids) = ladder_graph(3);
        wave_ladder(&mut graph, &ids, 10);
        assert!(graph.edges().is_empty());
        assert!(ids.len() == 3);
    }
}
