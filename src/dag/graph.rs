// src/dag/graph.rs

//! Arena-backed workflow DAG.
//!
//! Nodes are owned by the graph and addressed by [`NodeId`] (an index into
//! the arena); parent references are plain indices, used only for
//! dependency ordering. Edges may only point from earlier-created nodes to
//! later-created dependents, so the graph is acyclic by construction;
//! [`WorkflowGraph::validate`] additionally runs a toposort as a belt
//! check before the graph leaves the compiler.

use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, TrigflowError};

/// Opaque index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Role of a node in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    /// Runs the processing executable over one work unit.
    Primary,
    /// Merges/converts the outputs of one (channel group, segment) pairing.
    PostProcess,
    /// Moves merged files to the archive; runs after every post-process
    /// node.
    Archive,
    /// Removes intermediate per-chunk files at the very end.
    Cleanup,
}

impl NodeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeCategory::Primary => "process",
            NodeCategory::PostProcess => "postprocessing",
            NodeCategory::Archive => "archive",
            NodeCategory::Cleanup => "cleanup",
        }
    }
}

/// One schedulable node of the compiled workflow.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Unique name, stable across recompilations of the same request.
    pub name: String,
    pub category: NodeCategory,
    /// How many times the execution service retries this node on failure.
    pub retry: u32,
    /// Dependency back-references; always earlier-created nodes.
    pub parents: Vec<NodeId>,
    /// Executable the service runs for this node.
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    /// Declared input files (consumed, must exist before the node runs).
    pub inputs: Vec<PathBuf>,
    /// Declared output files (produced on success).
    pub outputs: Vec<PathBuf>,
    /// Attach a post-script that swallows the node's exit status, so one
    /// failed primary does not block the merge of whatever succeeded.
    pub swallow_failure: bool,
    /// Opaque scheduling policy passed through to the service adapter.
    pub release_condition: Option<String>,
    pub remove_condition: Option<String>,
}

/// Insertion-ordered node arena plus the edges implied by parent lists.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    nodes: Vec<GraphNode>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id.
    ///
    /// Panics if the node declares a parent that does not exist yet; the
    /// compiler only ever wires dependencies backwards.
    pub fn add_node(&mut self, node: GraphNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        for parent in &node.parents {
            assert!(
                parent.0 < id.0,
                "node '{}' declares parent created after itself",
                node.name
            );
        }
        self.nodes.push(node);
        id
    }

    /// Declare `parent` as a dependency of `child`.
    pub fn add_parent(&mut self, child: NodeId, parent: NodeId) {
        assert!(
            parent.0 < child.0,
            "dependency edge must point backwards ({} -> {})",
            parent.0,
            child.0
        );
        let node = &mut self.nodes[child.0];
        if !node.parents.contains(&parent) {
            node.parents.push(parent);
        }
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn ids_by_category(&self, category: NodeCategory) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, n)| n.category == category)
            .map(|(id, _)| id)
            .collect()
    }

    /// All dependency edges as `(parent, child)` pairs in child order.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut out = Vec::new();
        for (id, node) in self.iter() {
            for parent in &node.parents {
                out.push((*parent, id));
            }
        }
        out
    }

    /// Toposort the edge set to confirm acyclicity.
    pub fn validate(&self) -> Result<()> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for (id, _) in self.iter() {
            graph.add_node(id.0);
        }
        for (parent, child) in self.edges() {
            graph.add_edge(parent.0, child.0, ());
        }
        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(TrigflowError::ConfigError(format!(
                "cycle detected in workflow graph involving node '{}'",
                self.nodes[cycle.node_id()].name
            ))),
        }
    }
}
