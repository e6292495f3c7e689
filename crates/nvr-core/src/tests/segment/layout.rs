use crate::{StorageLayout, tests::support::at};

use std::path::Path;

/// WHAT: Segments land in a YYYY-MM-DD partition named after their start time
/// WHY: Retention deletes whole partitions by date
#[test]
fn given_timestamp_when_building_segment_path_then_partitioned_by_date() {
    // Given: A layout and a start time
    let layout = StorageLayout::new("/data/nvr");
    let start = at(2026, 6, 14, 9, 5, 7);

    // When: Building a segment path
    let path = layout.segment_path(&start, "gate", 3, "mp4");

    // Then: Partition and filename follow the layout
    assert_eq!(path.parent(), Some(Path::new("/data/nvr/2026-06-14")));
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("20260614_090507_000_gate_00003.mp4")
    );
}

/// WHAT: Filenames sort in start order
/// WHY: Operators browse partitions by name
#[test]
fn given_successive_segments_when_sorting_names_then_chronological() {
    // Given: Two segments a few seconds apart
    let layout = StorageLayout::new("root");
    let first = layout.segment_path(&at(2026, 6, 14, 9, 59, 58), "gate", 9, "mp4");
    let second = layout.segment_path(&at(2026, 6, 14, 10, 0, 3), "gate", 10, "mp4");

    // When/Then: Lexical order matches time order
    assert!(first.file_name() < second.file_name());
}
