// tests/partitioner.rs

mod common;
use common::{init_tracing, ready};

use trigflow::errors::TrigflowError;
use trigflow::partition::{self, channel_groups, sanitize_channel};
use trigflow::segments::{determine_segments, Segment};
use trigflow::types::OutputFormat;
use trigflow_test_utils::builders::RequestBuilder;
use trigflow_test_utils::fake_provider::FakeDataProvider;

#[test]
fn segment_splits_into_bounded_subspans() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    // 10 chunks of 100 seconds, at most 4 chunks per job: [4, 4, 2].
    let req = RequestBuilder::new("std", dir.path())
        .with_timing(100, 64, 4)
        .with_span(2, 998)
        .build();
    let provider = FakeDataProvider::new(2_000).with_available(0, 2_000);
    let plan = ready(determine_segments(&req, &provider, None, true).unwrap());
    assert_eq!(plan.segments, vec![Segment::new(0, 1_000)]);

    let parts = partition::partition(&req, &plan).unwrap();
    let spans: Vec<Segment> = parts.units.iter().map(|u| u.span).collect();
    assert_eq!(
        spans,
        vec![
            Segment::new(0, 400),
            Segment::new(400, 800),
            Segment::new(800, 1_000),
        ]
    );
    for unit in &parts.units {
        assert_eq!(unit.segment, Segment::new(0, 1_000));
        assert_eq!(unit.group_index, 0);
    }
}

#[test]
fn channels_are_grouped_in_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = RequestBuilder::new("std", dir.path())
        .with_channels(&["H1:A", "H1:B", "H1:C", "H1:D", "H1:E"])
        .with_max_channels_per_job(2)
        .build();

    let groups = channel_groups(&req).unwrap();
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].channels, vec!["H1:A", "H1:B"]);
    assert_eq!(groups[1].channels, vec!["H1:C", "H1:D"]);
    assert_eq!(groups[2].channels, vec!["H1:E"]);
    assert!(groups[2]
        .parameter_file
        .ends_with("parameters/parameters-2.txt"));
}

#[test]
fn empty_channel_list_is_an_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = RequestBuilder::new("std", dir.path())
        .with_channels(&[])
        .build();

    let err = channel_groups(&req).unwrap_err();
    assert!(matches!(err, TrigflowError::EmptyChannelGroup { index: 0 }));
}

#[test]
fn output_files_follow_archive_naming() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = RequestBuilder::new("std", dir.path())
        .with_timing(100, 64, 4)
        .with_span(2, 198)
        .with_formats(&[OutputFormat::Root])
        .build();
    let provider = FakeDataProvider::new(2_000).with_available(0, 2_000);
    let plan = ready(determine_segments(&req, &provider, None, true).unwrap());

    let parts = partition::partition(&req, &plan).unwrap();
    assert_eq!(parts.units.len(), 1);
    let files = &parts.units[0].outputs[&("H1:GDS-CALIB_STRAIN".to_string(), OutputFormat::Root)];

    // [0, 200) holds two 100-second chunks stepping 96.
    assert_eq!(files.len(), 3);
    assert!(files[0].ends_with("H1-GDS_CALIB_STRAIN/H1-GDS_CALIB_STRAIN_TRIGGERS-0-100.root"));
    assert!(files[1].ends_with("H1-GDS_CALIB_STRAIN/H1-GDS_CALIB_STRAIN_TRIGGERS-96-100.root"));
    assert!(files[2].ends_with("H1-GDS_CALIB_STRAIN/H1-GDS_CALIB_STRAIN_TRIGGERS-192-8.root"));
}

#[test]
fn file_tag_lands_in_the_trigger_name() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = RequestBuilder::new("std", dir.path())
        .with_timing(100, 64, 4)
        .with_span(2, 98)
        .with_formats(&[OutputFormat::Txt])
        .with_file_tag("ar")
        .build();
    let provider = FakeDataProvider::new(2_000).with_available(0, 2_000);
    let plan = ready(determine_segments(&req, &provider, None, true).unwrap());

    let parts = partition::partition(&req, &plan).unwrap();
    let files = &parts.units[0].outputs[&("H1:GDS-CALIB_STRAIN".to_string(), OutputFormat::Txt)];
    assert!(files[0]
        .to_string_lossy()
        .contains("H1-GDS_CALIB_STRAIN_TRIGGERS_AR-0-100.txt"));
}

#[test]
fn channel_names_are_sanitized() {
    assert_eq!(sanitize_channel("H1:GDS-CALIB_STRAIN"), "H1-GDS_CALIB_STRAIN");
    assert_eq!(sanitize_channel("L1:SUS-ETMX_L2"), "L1-SUS_ETMX_L2");
}

#[test]
fn partition_is_deterministic() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let req = RequestBuilder::new("std", dir.path())
        .with_channels(&["H1:A", "H1:B", "H1:C"])
        .with_max_channels_per_job(2)
        .build();
    let provider = FakeDataProvider::new(20_000).with_available(0, 20_000);
    let plan = ready(determine_segments(&req, &provider, None, true).unwrap());

    let a = partition::partition(&req, &plan).unwrap();
    let b = partition::partition(&req, &plan).unwrap();
    assert_eq!(a.units.len(), b.units.len());
    for (x, y) in a.units.iter().zip(&b.units) {
        assert_eq!(x.span, y.span);
        assert_eq!(x.group_index, y.group_index);
        assert_eq!(x.outputs, y.outputs);
    }
}
