//! Typed identifiers for documents, sessions, blocks, and regions.
//!
//! Two families live here:
//!
//! - `DocumentId` and `SessionId` wrap UUIDv7 (time-ordered, globally unique).
//!   They display as standard UUID text for logging; `short()` is for humans.
//! - `BlockId` and `RegionHandle` are small integers scoped to one piece table.
//!   A `BlockId` is the append position of a block in that table's block list.
//!   A `RegionHandle` is what `open_block` hands out and `close_block` takes
//!   back; it always names a block, never a position in the entry table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A document identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

/// An editing session identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_uuid_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters, for human display only.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// A nil / zero ID for sentinel values.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Check if this is the nil ID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_uuid_id!(DocumentId, "DocumentId");
impl_uuid_id!(SessionId, "SessionId");

// ── Table-scoped identifiers ────────────────────────────────────────────────

/// Append position of a block in a piece table's block list.
///
/// Blocks are never removed individually, so an id stays valid for the
/// lifetime of the table.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(usize);

impl BlockId {
    /// The block holding the original (or last compacted) document.
    pub const ORIGINAL: BlockId = BlockId(0);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

/// Handle for an editable region carved out by `open_block`.
///
/// Wraps the id of the block that backs the region. Deliberately not
/// convertible from a bare integer so it cannot be confused with a table
/// position.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionHandle(BlockId);

impl RegionHandle {
    pub const fn new(block: BlockId) -> Self {
        Self(block)
    }

    /// The block backing this region.
    pub const fn block(self) -> BlockId {
        self.0
    }
}

impl From<RegionHandle> for BlockId {
    fn from(handle: RegionHandle) -> BlockId {
        handle.0
    }
}

impl fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionHandle({})", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(DocumentId::new(), DocumentId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_short_is_eight_hex_chars() {
        let id = SessionId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_parse_display_roundtrip() {
        let id = DocumentId::new();
        let parsed = DocumentId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_debug_uses_short_form() {
        let id = DocumentId::new();
        assert_eq!(format!("{id:?}"), format!("DocumentId({})", id.short()));
    }

    #[test]
    fn test_nil() {
        assert!(SessionId::nil().is_nil());
        assert!(!SessionId::new().is_nil());
    }

    #[test]
    fn test_region_handle_names_block() {
        let handle = RegionHandle::new(BlockId::new(3));
        assert_eq!(handle.block(), BlockId::new(3));
        assert_eq!(BlockId::from(handle).index(), 3);
        assert_eq!(handle.to_string(), "#3");
    }

    #[test]
    fn test_handle_serializes_as_bare_integer() {
        let handle = RegionHandle::new(BlockId::new(7));
        assert_eq!(serde_json::to_string(&handle).unwrap(), "7");

        let bytes = postcard::to_stdvec(&handle).unwrap();
        let parsed: RegionHandle = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, handle);
    }
}
