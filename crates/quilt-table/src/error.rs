//! Error types for piece table operations.

use thiserror::Error;

use quilt_types::{BlockId, RegionHandle};

/// Errors that can occur during piece table operations.
///
/// None of these are fatal to the table: a failed call leaves it unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Logical line address outside `[0, len)`.
    #[error("line {line} out of range for document with {len} lines")]
    LineOutOfRange { line: usize, len: usize },

    /// Requested region exceeds the document or overlaps an open region.
    #[error("illegal region request at line {start} for {length} lines: {reason}")]
    IllegalRegion {
        start: usize,
        length: usize,
        reason: &'static str,
    },

    /// No block with this id in the block list.
    #[error("unknown block: {0:?}")]
    UnknownBlock(BlockId),

    /// Content edit on a region that has already been closed.
    #[error("region {0} is closed")]
    BlockClosed(RegionHandle),

    /// Content edit that would leave a region with no lines.
    #[error("region {0} cannot be emptied")]
    EmptyRegion(RegionHandle),

    /// The region's block exists but no table entry references it any more.
    #[error("region {0} is not mapped into the document")]
    RegionNotMapped(RegionHandle),

    /// Slice request past the end of a block.
    #[error("slice of {length} lines at {start} out of range for block with {len} lines")]
    BlockIndex {
        start: usize,
        length: usize,
        len: usize,
    },

    /// Internal consistency check failed.
    #[error("inconsistent piece table: {0}")]
    Inconsistent(String),
}

impl TableError {
    pub(crate) fn illegal(start: usize, length: usize, reason: &'static str) -> Self {
        Self::IllegalRegion {
            start,
            length,
            reason,
        }
    }
}
