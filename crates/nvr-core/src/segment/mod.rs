mod layout;
mod writer;

pub use {
    layout::{PARTITION_FORMAT, StorageLayout},
    writer::{SegmentState, SegmentSummary, SegmentWriter},
};
