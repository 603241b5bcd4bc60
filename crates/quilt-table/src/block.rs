//! Blocks: owned runs of lines plus an open/closed flag.

use crate::{Result, TableError};

/// A backing buffer of lines.
///
/// Each line keeps its own terminator, so concatenating a block's lines
/// reproduces its exact bytes. A block is either the closed original snapshot
/// or an open fragment carved out for an editing session. The only state
/// transition is open → closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    lines: Vec<String>,
    open: bool,
}

impl Block {
    /// Create a closed block (original or compacted content).
    pub fn closed(lines: Vec<String>) -> Self {
        Self { lines, open: false }
    }

    /// Create an open block for a freshly carved region.
    pub fn open(lines: Vec<String>) -> Self {
        Self { lines, open: true }
    }

    /// Number of lines currently held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// All lines, in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Copy out `length` lines starting at `start`.
    pub fn slice(&self, start: usize, length: usize) -> Result<Vec<String>> {
        Ok(self.borrow_slice(start, length)?.to_vec())
    }

    /// Borrowing variant of [`Block::slice`] for callers that copy anyway.
    pub(crate) fn borrow_slice(&self, start: usize, length: usize) -> Result<&[String]> {
        let end = start
            .checked_add(length)
            .filter(|&end| end <= self.lines.len())
            .ok_or(TableError::BlockIndex {
                start,
                length,
                len: self.lines.len(),
            })?;
        Ok(&self.lines[start..end])
    }

    /// Mark the block closed. Closing a closed block does nothing.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Swap in new content wholesale, regardless of the open flag.
    ///
    /// This is a re-snapshot hook for the table (compaction, region edits),
    /// not a client-facing edit.
    pub fn replace_content(&mut self, lines: Vec<String>) {
        self.lines = lines;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_slice_copies_requested_run() {
        let block = Block::closed(lines(&["a\n", "b\n", "c\n"]));
        assert_eq!(block.slice(1, 2).unwrap(), lines(&["b\n", "c\n"]));
        assert_eq!(block.slice(3, 0).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_slice_past_end_fails() {
        let block = Block::closed(lines(&["a\n", "b\n"]));
        assert_eq!(
            block.slice(1, 2),
            Err(TableError::BlockIndex {
                start: 1,
                length: 2,
                len: 2
            })
        );
        assert!(block.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut block = Block::open(lines(&["x\n"]));
        assert!(block.is_open());
        block.close();
        assert!(!block.is_open());
        block.close();
        assert!(!block.is_open());
    }

    #[test]
    fn test_replace_content_ignores_flag() {
        let mut block = Block::closed(lines(&["old\n"]));
        block.replace_content(lines(&["new\n", "lines\n"]));
        assert_eq!(block.len(), 2);
        assert!(!block.is_open());
    }
}
