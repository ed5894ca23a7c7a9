// src/dag/mod.rs

//! Workflow compilation.
//!
//! - [`graph`] holds the arena-backed workflow DAG handed to the execution
//!   service.
//! - [`compiler`] turns a segment plan plus its partition into that graph:
//!   primary nodes, the bounded-concurrency wave ladder, post-processing,
//!   archival and cleanup.
//! - [`script`] is the versioned command grammar for the generated
//!   post-processing shell scripts.
//! - [`writer`] serializes the compiled workflow to the execution
//!   service's submit format.

pub mod compiler;
pub mod graph;
pub mod script;
pub mod writer;

pub use compiler::{compile, CompiledWorkflow};
pub use graph::{GraphNode, NodeCategory, NodeId, WorkflowGraph};
pub use script::ScriptOp;
