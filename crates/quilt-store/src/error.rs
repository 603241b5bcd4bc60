//! Store error types.

use std::io;

use thiserror::Error;

use quilt_table::TableError;
use quilt_types::{DocumentId, RegionHandle, SessionId};

use crate::ConfigError;

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with this id is loaded.
    #[error("document not found: {0:?}")]
    DocumentNotFound(DocumentId),

    /// The piece table rejected the operation.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A session touched a region it does not own.
    #[error("region {handle} is not owned by session {session:?}")]
    NotOwner {
        handle: RegionHandle,
        session: SessionId,
    },

    /// The session already holds the configured maximum of open regions.
    #[error("session {session:?} already holds {limit} open regions")]
    RegionLimit { session: SessionId, limit: usize },

    /// Document name is empty or escapes the backend root.
    #[error("invalid document name: {0}")]
    InvalidName(String),

    /// Persistence backend I/O failure.
    #[error("backend I/O error: {0}")]
    Backend(#[from] io::Error),

    /// Config could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// True when the caller can retry with a different region.
    pub fn is_region_conflict(&self) -> bool {
        matches!(self, Self::Table(TableError::IllegalRegion { .. }))
    }
}
