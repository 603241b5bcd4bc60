//! Serializable view of a piece table's layout, for diagnostics and events.

use serde::{Deserialize, Serialize};

use quilt_types::BlockId;

use crate::PieceTable;

/// One table row with its logical start and the backing block's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub block: BlockId,
    pub offset: usize,
    pub length: usize,
    pub start: usize,
    pub open: bool,
}

/// Layout of a table at one point in time. Carries no line content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub len: usize,
    pub block_count: usize,
    pub entries: Vec<EntrySnapshot>,
}

impl PieceTable {
    pub fn snapshot(&self) -> TableSnapshot {
        let mut start = 0;
        let entries = self
            .entries()
            .iter()
            .map(|entry| {
                let row = EntrySnapshot {
                    block: entry.block,
                    offset: entry.offset,
                    length: entry.length,
                    start,
                    open: self.block(entry.block).is_ok_and(|b| b.is_open()),
                };
                start += entry.length;
                row
            })
            .collect();

        TableSnapshot {
            len: start,
            block_count: self.blocks().len(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PieceTable {
        let mut table = PieceTable::from_text("a\nb\nc\nd\ne\n");
        table.open_block(1, 2).unwrap();
        table
    }

    #[test]
    fn test_snapshot_tracks_starts_and_flags() {
        let snap = table().snapshot();
        assert_eq!(snap.len, 5);
        assert_eq!(snap.block_count, 2);
        let starts: Vec<usize> = snap.entries.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![0, 1, 3]);
        let open: Vec<bool> = snap.entries.iter().map(|e| e.open).collect();
        assert_eq!(open, vec![false, true, false]);
    }

    #[test]
    fn test_json_roundtrip() {
        let snap = table().snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: TableSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, parsed);
    }

    #[test]
    fn test_postcard_roundtrip() {
        let snap = table().snapshot();
        let bytes = postcard::to_stdvec(&snap).unwrap();
        let parsed: TableSnapshot = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(snap, parsed);
    }
}
