//! Multi-document store for quilt.
//!
//! Wraps each [`PieceTable`](quilt_table::PieceTable) in the serialization
//! boundary it needs: one mutex per document, region ownership by session,
//! change events, and a pluggable persistence backend.
//!
//! ```
//! use quilt_store::{DocumentStore, StoreConfig};
//! use quilt_types::SessionId;
//!
//! let store = DocumentStore::in_memory(StoreConfig::default());
//! let doc = store.create("notes", "a\nb\nc\n");
//! let alice = SessionId::new();
//!
//! let region = store.open_region(doc, alice, 0, 2).unwrap();
//! assert!(store.open_region(doc, SessionId::new(), 1, 1).is_err());
//! store.close_region(doc, alice, region).unwrap();
//! ```

mod backend;
mod config;
mod error;
mod store;

pub use backend::{DocumentBackend, FsBackend, MemoryBackend};
pub use config::{ConfigError, DEFAULT_EVENT_CAPACITY, StoreConfig};
pub use error::StoreError;
pub use store::{DocumentEntry, DocumentEvent, DocumentStore, RegionInfo};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
