//! Line-addressed piece table with region locking for quilt.
//!
//! A document is one closed original block plus any number of blocks carved
//! out by editing sessions. The [`PieceTable`] maps the logical line sequence
//! onto those blocks through an ordered list of [`Entry`] rows.
//!
//! # Region locking
//!
//! [`PieceTable::open_block`] copies a line range into a fresh open block and
//! splices it into the table. While that block is open, no other region may
//! touch any of its lines. [`PieceTable::close_block`] releases the lock
//! without touching the table; [`PieceTable::remove_closed_blocks`] later
//! folds closed content back into a single block before a save.
//!
//! ```
//! use quilt_table::PieceTable;
//!
//! let mut table = PieceTable::from_text("a\nb\nc\nd\ne\n");
//! let region = table.open_block(1, 2).unwrap();
//! assert!(table.open_block(2, 1).is_err());
//! table.close_block(region).unwrap();
//! assert!(table.open_block(2, 1).is_ok());
//! ```

mod block;
mod error;
mod snapshot;
mod table;

pub use block::Block;
pub use error::TableError;
pub use snapshot::{EntrySnapshot, TableSnapshot};
pub use table::{Entry, Location, PieceTable, split_lines};

pub use quilt_types::{BlockId, RegionHandle};

/// Result type for piece table operations.
pub type Result<T> = std::result::Result<T, TableError>;
