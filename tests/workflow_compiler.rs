// tests/workflow_compiler.rs

mod common;
use common::{init_tracing, ready};

use trigflow::config::MergePolicy;
use trigflow::dag::{self, NodeCategory, ScriptOp};
use trigflow::dag::script;
use trigflow::partition;
use trigflow::segments::determine_segments;
use trigflow::types::OutputFormat;
use trigflow_test_utils::builders::RequestBuilder;
use trigflow_test_utils::fake_provider::FakeDataProvider;

fn base_builder(dir: &std::path::Path) -> RequestBuilder {
    // Two channel groups, one segment of two sub-spans each.
    RequestBuilder::new("std", dir)
        .with_timing(100, 64, 4)
        .with_span(2, 798)
        .with_channels(&["H1:A", "H1:B", "H1:C"])
        .with_max_channels_per_job(2)
}

fn compile_with(
    req: &trigflow::config::ProcessingRequest,
) -> (trigflow::dag::CompiledWorkflow, trigflow::segments::SegmentPlan) {
    let provider = FakeDataProvider::new(2_000).with_available(0, 2_000);
    let plan = ready(determine_segments(req, &provider, None, true).unwrap());
    let parts = partition::partition(req, &plan).unwrap();
    (dag::compile(req, &plan, &parts).unwrap(), plan)
}

#[test]
fn node_layout_for_a_small_plan() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path()).build();
    let (workflow, _plan) = compile_with(&req);

    let g = &workflow.graph;
    assert_eq!(g.ids_by_category(NodeCategory::Primary).len(), 4);
    assert_eq!(g.ids_by_category(NodeCategory::PostProcess).len(), 2);
    assert_eq!(g.ids_by_category(NodeCategory::Archive).len(), 0);
    assert_eq!(g.ids_by_category(NodeCategory::Cleanup).len(), 1);
    assert_eq!(g.len(), 7);

    let names: Vec<&str> = g.iter().map(|(_, n)| n.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "process_g0_0_400",
            "process_g0_400_800",
            "merge_g0_0_800",
            "process_g1_0_400",
            "process_g1_400_800",
            "merge_g1_0_800",
            "post_process_rm",
        ]
    );
}

#[test]
fn post_process_nodes_depend_on_their_own_primaries() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path()).build();
    let (workflow, _plan) = compile_with(&req);

    let g = &workflow.graph;
    for pp in g.ids_by_category(NodeCategory::PostProcess) {
        let node = g.node(pp);
        assert_eq!(node.parents.len(), 2);
        let group_tag = &node.name["merge_".len().."merge_".len() + 2];
        for parent in &node.parents {
            let pname = &g.node(*parent).name;
            assert!(pname.starts_with(&format!("process_{group_tag}")));
        }
    }
}

#[test]
fn wave_ladder_chains_primaries_across_groups() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path()).with_max_concurrent(1).build();
    let (workflow, _plan) = compile_with(&req);

    let g = &workflow.graph;
    let primaries = g.ids_by_category(NodeCategory::Primary);
    // Each primary after the first waits for the previous one, regardless
    // of which channel group it belongs to.
    for pair in primaries.windows(2) {
        assert!(g.node(pair[1]).parents.contains(&pair[0]));
    }
    assert!(g.node(primaries[0]).parents.is_empty());
}

#[test]
fn cleanup_follows_every_merge_without_archiving() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path()).build();
    let (workflow, _plan) = compile_with(&req);

    let g = &workflow.graph;
    let cleanup = g.ids_by_category(NodeCategory::Cleanup)[0];
    assert_eq!(
        g.node(cleanup).parents,
        g.ids_by_category(NodeCategory::PostProcess)
    );
}

#[test]
fn archive_sits_between_merges_and_cleanup() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path()).with_archive().build();
    let (workflow, _plan) = compile_with(&req);

    let g = &workflow.graph;
    let archive = g.ids_by_category(NodeCategory::Archive)[0];
    let cleanup = g.ids_by_category(NodeCategory::Cleanup)[0];
    assert_eq!(
        g.node(archive).parents,
        g.ids_by_category(NodeCategory::PostProcess)
    );
    assert_eq!(g.node(cleanup).parents, vec![archive]);
}

#[test]
fn skip_rm_drops_the_cleanup_node() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path())
        .with_merge_policy(MergePolicy {
            skip_rm: true,
            ..MergePolicy::default()
        })
        .build();
    let (workflow, _plan) = compile_with(&req);

    assert!(workflow
        .graph
        .ids_by_category(NodeCategory::Cleanup)
        .is_empty());
}

#[test]
fn merge_scripts_round_trip_through_the_grammar() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path())
        .with_formats(&[OutputFormat::Root, OutputFormat::Xml])
        .with_merge_policy(MergePolicy {
            skip_root_merge: true,
            skip_gzip: true,
            ..MergePolicy::default()
        })
        .build();
    let (workflow, _plan) = compile_with(&req);

    let path = req.dirs.condor.join("post-process-0-0-800.sh");
    let content = workflow.scripts.get(&path).expect("merge script rendered");
    let ops = script::parse(content).unwrap();

    // One merge per (channel, format): 2 channels in group 0, 2 formats.
    assert_eq!(ops.len(), 4);
    for op in &ops {
        match op {
            ScriptOp::Merge {
                format,
                no_merge,
                no_gzip,
                ..
            } => {
                assert_eq!(*no_merge, *format == OutputFormat::Root);
                assert_eq!(*no_gzip, *format == OutputFormat::Xml);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }
}

#[test]
fn compilation_is_deterministic() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path()).with_archive().build();

    let (first, _) = compile_with(&req);
    let (second, _) = compile_with(&req);

    assert_eq!(dag::writer::render_dag(&first, &req), dag::writer::render_dag(&second, &req));
    assert_eq!(first.scripts, second.scripts);
    assert_eq!(first.parameter_files, second.parameter_files);
}

#[test]
fn rendered_dag_lists_jobs_and_dependencies() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = base_builder(dir.path()).build();
    let (workflow, _plan) = compile_with(&req);

    let text = dag::writer::render_dag(&workflow, &req);
    assert!(text.contains("JOB process_g0_0_400"));
    assert!(text.contains("RETRY process_g0_0_400 2"));
    assert!(text.contains("SCRIPT POST process_g0_0_400 /bin/true"));
    assert!(text.contains("CATEGORY merge_g0_0_800 postprocessing"));
    assert!(text.contains("PARENT process_g0_0_400 process_g0_400_800 CHILD merge_g0_0_800"));
}
