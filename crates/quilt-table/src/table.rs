//! The piece table: an ordered list of entries over append-only blocks.
//!
//! # Layout
//!
//! ```text
//! blocks:  [0] original (closed)   [1] region (open)   [2] region (closed) ...
//! entries: (0, 0, 2) (1, 0, 3) (0, 5, 1) (2, 0, 4) (0, 10, 90)
//!           block offset length, in logical document order
//! ```
//!
//! Reading the `length` lines of every entry at `offset` in its block, in
//! entry order, yields the document. Opening a region splits the entry that
//! contains its first line, inserts one entry for the new open block, and
//! trims whatever the region swallowed to its right.

use std::fmt;
use std::ops::{Range, RangeInclusive};

use serde::{Deserialize, Serialize};

use quilt_types::{BlockId, RegionHandle};

use crate::{Block, Result, TableError};

/// One contiguous run of a block placed at some position in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub block: BlockId,
    pub offset: usize,
    pub length: usize,
}

impl Entry {
    pub fn new(block: BlockId, offset: usize, length: usize) -> Self {
        Self {
            block,
            offset,
            length,
        }
    }
}

/// Where a logical line lives in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Position of the owning entry in the entry list.
    pub position: usize,
    /// Line offset within that entry (not within its block).
    pub offset: usize,
}

/// Line-addressed piece table with region locking.
///
/// Not internally synchronized: callers serialize every mutation for a given
/// table (the document store holds it behind a mutex).
#[derive(Debug, Clone)]
pub struct PieceTable {
    blocks: Vec<Block>,
    entries: Vec<Entry>,
}

impl PieceTable {
    /// Build a table over a pre-split line list. Each line keeps its terminator.
    pub fn from_lines(lines: Vec<String>) -> Self {
        let entries = if lines.is_empty() {
            Vec::new()
        } else {
            vec![Entry::new(BlockId::ORIGINAL, 0, lines.len())]
        };
        Self {
            blocks: vec![Block::closed(lines)],
            entries,
        }
    }

    /// Build a table from raw text, splitting after every `\n`.
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(split_lines(text))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Logical document length in lines.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Result<&Block> {
        self.blocks.get(id.index()).ok_or(TableError::UnknownBlock(id))
    }

    /// Logical line at which the entry at `position` begins.
    pub fn entry_start(&self, position: usize) -> usize {
        self.entries.iter().take(position).map(|e| e.length).sum()
    }

    fn entry_is_open(&self, entry: &Entry) -> bool {
        self.blocks
            .get(entry.block.index())
            .is_some_and(Block::is_open)
    }

    // =========================================================================
    // Addressing
    // =========================================================================

    /// Find the entry owning logical `line` and the offset inside that entry.
    pub fn locate(&self, line: usize) -> Result<Location> {
        let mut entry_start = 0;
        for (position, entry) in self.entries.iter().enumerate() {
            if line < entry_start + entry.length {
                return Ok(Location {
                    position,
                    offset: line - entry_start,
                });
            }
            entry_start += entry.length;
        }
        Err(TableError::LineOutOfRange {
            line,
            len: entry_start,
        })
    }

    /// Inclusive range of entry positions covering `[start, start + length)`.
    ///
    /// A length running past the end of the document is clamped at the last
    /// entry.
    pub fn span(&self, start: usize, length: usize) -> Result<RangeInclusive<usize>> {
        let first = self.locate(start)?;
        let mut remaining =
            length.saturating_sub(self.entries[first.position].length - first.offset);
        let mut last = first.position;

        while remaining > 0 && last + 1 < self.entries.len() {
            last += 1;
            remaining = remaining.saturating_sub(self.entries[last].length);
        }

        Ok(first.position..=last)
    }

    /// Assemble `length` lines starting at logical line `start`.
    ///
    /// The remaining-count is decremented by each entry's full run from the
    /// read point, not by how many lines were actually taken from it, so it
    /// hits zero exactly on an entry boundary. A request past the end of the
    /// document returns what exists.
    pub fn read(&self, start: usize, length: usize) -> Result<Vec<String>> {
        let first = self.locate(start)?;
        let span = self.span(start, length)?;

        let mut lines = Vec::with_capacity(length.min(self.len() - start));
        let mut remaining = length;

        for position in span {
            let entry = self.entries[position];
            let skip = if position == first.position {
                first.offset
            } else {
                0
            };
            let run = entry.length - skip;
            let block = self.block(entry.block)?;
            lines.extend_from_slice(block.borrow_slice(entry.offset + skip, remaining.min(run))?);
            remaining = remaining.saturating_sub(run);
        }

        Ok(lines)
    }

    /// Every line from `start` through the end of the document.
    pub fn read_to_end(&self, start: usize) -> Result<Vec<String>> {
        self.read(start, self.len())
    }

    /// The full document, in table order.
    pub fn stitch(&self) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(self.len());
        for entry in &self.entries {
            let block = self.block(entry.block)?;
            lines.extend_from_slice(block.borrow_slice(entry.offset, entry.length)?);
        }
        Ok(lines)
    }

    // =========================================================================
    // Region locking
    // =========================================================================

    /// Carve `[start, start + length)` out as a new open block.
    ///
    /// Fails without touching the table if the region is empty, runs past the
    /// end of the document, or touches any entry backed by an open block.
    pub fn open_block(&mut self, start: usize, length: usize) -> Result<RegionHandle> {
        if length == 0 {
            tracing::debug!(start, "rejecting empty region");
            return Err(TableError::illegal(start, length, "region is empty"));
        }
        let doc_len = self.len();
        if !start.checked_add(length).is_some_and(|end| end <= doc_len) {
            tracing::debug!(start, length, doc_len, "rejecting region past end of document");
            return Err(TableError::illegal(start, length, "region exceeds document bounds"));
        }

        let span = self.span(start, length)?;
        if let Some(position) = span.into_iter().find(|&p| self.entry_is_open(&self.entries[p])) {
            tracing::debug!(
                start,
                length,
                block = %self.entries[position].block,
                "rejecting region overlapping open block"
            );
            return Err(TableError::illegal(start, length, "region overlaps an open region"));
        }

        // Everything fallible happens before the first mutation.
        let location = self.locate(start)?;
        let snapshot = self.read(start, length)?;

        let id = BlockId::new(self.blocks.len());
        self.blocks.push(Block::open(snapshot));

        let original = self.entries[location.position];
        let mut at = location.position;
        if location.offset == 0 {
            self.entries.remove(at);
        } else {
            self.entries[at].length = location.offset;
            at += 1;
        }
        self.entries.insert(at, Entry::new(id, 0, length));

        let rest = original.length - location.offset;
        if rest > length {
            let tail = Entry::new(
                original.block,
                original.offset + location.offset + length,
                rest - length,
            );
            tracing::trace!(?tail, "region ends inside its first entry, keeping tail");
            self.entries.insert(at + 1, tail);
        } else {
            self.absorb(at + 1, length - rest);
        }

        tracing::debug!(block = %id, start, length, entries = self.entries.len(), "opened region");
        Ok(RegionHandle::new(id))
    }

    /// Remove `overshoot` lines from the entries starting at `position`,
    /// dropping whole entries and trimming the head of the last partial one.
    fn absorb(&mut self, position: usize, mut overshoot: usize) {
        while overshoot > 0 && position < self.entries.len() {
            let entry_len = self.entries[position].length;
            if overshoot >= entry_len {
                tracing::trace!(entry = ?self.entries[position], "region swallows entry");
                overshoot -= entry_len;
                self.entries.remove(position);
            } else {
                let entry = &mut self.entries[position];
                entry.offset += overshoot;
                entry.length -= overshoot;
                overshoot = 0;
            }
        }
    }

    /// Close the block behind `handle`. Closing an already-closed block is a no-op.
    pub fn close_block(&mut self, handle: RegionHandle) -> Result<()> {
        let id = handle.block();
        let block = self
            .blocks
            .get_mut(id.index())
            .ok_or(TableError::UnknownBlock(id))?;
        if block.is_open() {
            block.close();
            tracing::debug!(block = %id, "closed region");
        }
        Ok(())
    }

    /// Replace the content of an open region, resizing its entry.
    pub fn edit_block(&mut self, handle: RegionHandle, lines: Vec<String>) -> Result<()> {
        if lines.is_empty() {
            return Err(TableError::EmptyRegion(handle));
        }
        let (position, _) = self.open_entry(handle)?;

        self.entries[position].length = lines.len();
        self.blocks[handle.block().index()].replace_content(lines);

        tracing::debug!(block = %handle.block(), lines = self.entries[position].length, "edited region");
        Ok(())
    }

    /// Logical line range currently covered by a region, open or closed.
    ///
    /// A closed region that later opens have split spans from its first
    /// piece to its last. Once compaction has folded a closed region into
    /// block 0 it is [`TableError::RegionNotMapped`].
    pub fn region_range(&self, handle: RegionHandle) -> Result<Range<usize>> {
        let id = handle.block();
        self.block(id)?;

        let mut range: Option<Range<usize>> = None;
        let mut line = 0;
        for entry in &self.entries {
            let end = line + entry.length;
            if entry.block == id {
                range = Some(range.map_or(line, |r| r.start)..end);
            }
            line = end;
        }
        range.ok_or(TableError::RegionNotMapped(handle))
    }

    /// Every open region in document order, with its logical line range.
    pub fn open_regions(&self) -> Vec<(RegionHandle, Range<usize>)> {
        let mut regions = Vec::new();
        let mut line = 0;
        for entry in &self.entries {
            if self.entry_is_open(entry) {
                regions.push((RegionHandle::new(entry.block), line..line + entry.length));
            }
            line += entry.length;
        }
        regions
    }

    /// Position and logical start of the single entry mapping an open block.
    fn open_entry(&self, handle: RegionHandle) -> Result<(usize, usize)> {
        let id = handle.block();
        if !self.block(id)?.is_open() {
            return Err(TableError::BlockClosed(handle));
        }

        let mut line = 0;
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.block == id {
                return Ok((position, line));
            }
            line += entry.length;
        }
        Err(TableError::RegionNotMapped(handle))
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Collapse all closed content into block 0 and return the stitched document.
    ///
    /// Block 0 is rewritten with the full stitched document, so a closed run's
    /// logical start is also its offset into block 0. Open entries are kept
    /// as-is at their recomputed positions. Closed blocks that no entry
    /// references any more are emptied; their ids stay valid.
    ///
    /// An inconsistent table is refused with [`TableError::Inconsistent`]
    /// before anything is rewritten, and the result is checked again.
    pub fn remove_closed_blocks(&mut self) -> Result<Vec<String>> {
        self.validate()?;
        let stitched = self.stitch()?;

        let mut entries: Vec<Entry> = Vec::with_capacity(self.entries.len());
        let mut line = 0;
        for entry in &self.entries {
            if self.entry_is_open(entry) {
                entries.push(*entry);
            } else {
                match entries.last_mut() {
                    Some(last)
                        if last.block == BlockId::ORIGINAL && last.offset + last.length == line =>
                    {
                        last.length += entry.length;
                    }
                    _ => entries.push(Entry::new(BlockId::ORIGINAL, line, entry.length)),
                }
            }
            line += entry.length;
        }

        let mut retired = 0usize;
        for block in self.blocks.iter_mut().skip(1) {
            if !block.is_open() && !block.is_empty() {
                block.replace_content(Vec::new());
                retired += 1;
            }
        }
        self.blocks[BlockId::ORIGINAL.index()].replace_content(stitched.clone());

        tracing::debug!(
            before = self.entries.len(),
            after = entries.len(),
            retired,
            lines = stitched.len(),
            "compacted piece table"
        );
        self.entries = entries;
        self.validate()?;
        Ok(stitched)
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    /// Check the structural invariants, reporting the first violation.
    ///
    /// - no entry has zero length
    /// - every entry lies within its block
    /// - every open block is mapped by exactly one entry covering all of it
    pub fn validate(&self) -> Result<()> {
        let mut mapped = vec![0usize; self.blocks.len()];

        for (position, entry) in self.entries.iter().enumerate() {
            if entry.length == 0 {
                return Err(TableError::Inconsistent(format!(
                    "entry {position} has zero length"
                )));
            }
            let block = self.blocks.get(entry.block.index()).ok_or_else(|| {
                TableError::Inconsistent(format!(
                    "entry {position} references missing block {}",
                    entry.block
                ))
            })?;
            if entry.offset + entry.length > block.len() {
                return Err(TableError::Inconsistent(format!(
                    "entry {position} ({}+{}) overruns block {} of {} lines",
                    entry.offset,
                    entry.length,
                    entry.block,
                    block.len()
                )));
            }
            if block.is_open() && (entry.offset != 0 || entry.length != block.len()) {
                return Err(TableError::Inconsistent(format!(
                    "entry {position} covers only part of open block {}",
                    entry.block
                )));
            }
            mapped[entry.block.index()] += 1;
        }

        for (index, block) in self.blocks.iter().enumerate() {
            if block.is_open() && mapped[index] != 1 {
                return Err(TableError::Inconsistent(format!(
                    "open block {index} is mapped by {} entries",
                    mapped[index]
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PieceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10}{:>10}{:>10}{:>10}", "Block", "Offset", "Length", "Open")?;
        for entry in &self.entries {
            writeln!(
                f,
                "{:>10}{:>10}{:>10}{:>10}",
                entry.block.to_string(),
                entry.offset,
                entry.length,
                self.entry_is_open(entry)
            )?;
        }
        Ok(())
    }
}

/// Split text into lines, each keeping its `\n`. A final unterminated line is kept.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_owned).collect()
}

// ============================================================================
// Tests
// ============================================================================
