//! Shared identifier types for quilt.
//!
//! A pure leaf crate: the piece table, the document store, and the CLI all
//! name documents, sessions, blocks, and regions with these types.
//!
//! |-----------------|-----------------------------------------------|
//! | Type            | Purpose                                       |
//! |-----------------|-----------------------------------------------|
//! | [`DocumentId`]  | Which document in a store                     |
//! | [`SessionId`]   | Which editing session owns a region           |
//! | [`BlockId`]     | Append position of a block within one table   |
//! | [`RegionHandle`]| Opaque handle for an opened editable region   |
//! |-----------------|-----------------------------------------------|

pub mod ids;

pub use ids::{BlockId, DocumentId, RegionHandle, SessionId};
