//! Multi-document store with session-owned regions.
//!
//! # Concurrency Model
//!
//! - DashMap for concurrent lookup of documents by id
//! - A name index DashMap whose entry lock is held across a backend load, so
//!   concurrent loads of one name resolve to one document
//! - One parking_lot Mutex per document guarding its piece table together
//!   with the region ownership map, so the check-then-split of an open and
//!   compaction each run as a single critical section
//! - Event broadcasting for real-time updates
//!
//! The DashMap guard is always dropped before a document mutex is taken.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use quilt_table::{PieceTable, TableSnapshot};
use quilt_types::{DocumentId, RegionHandle, SessionId};

use crate::backend::{DocumentBackend, MemoryBackend};
use crate::{StoreConfig, StoreError, StoreResult};

/// Events broadcast when documents change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DocumentEvent {
    /// A document was created or loaded.
    Created {
        document: DocumentId,
        name: String,
        lines: usize,
    },
    /// A session locked a region.
    RegionOpened {
        document: DocumentId,
        session: SessionId,
        handle: RegionHandle,
        start: usize,
        length: usize,
    },
    /// A region was released.
    RegionClosed {
        document: DocumentId,
        session: SessionId,
        handle: RegionHandle,
    },
    /// A session replaced its region's content.
    RegionEdited {
        document: DocumentId,
        session: SessionId,
        handle: RegionHandle,
        lines: usize,
    },
    /// Closed content was folded back into the original block.
    Compacted { document: DocumentId, lines: usize },
    /// The document was written to the backend.
    Saved {
        document: DocumentId,
        name: String,
        lines: usize,
    },
}

/// An open region and who holds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegionInfo {
    pub handle: RegionHandle,
    pub session: SessionId,
    pub lines: Range<usize>,
}

/// Table plus ownership, always locked together.
struct DocumentState {
    table: PieceTable,
    owners: HashMap<RegionHandle, SessionId>,
}

/// Entry for a document in the store.
pub struct DocumentEntry {
    name: String,
    state: Mutex<DocumentState>,
    /// Incremented on each successful mutation.
    version: AtomicU64,
}

impl DocumentEntry {
    fn new(name: String, table: PieceTable) -> Self {
        Self {
            name,
            state: Mutex::new(DocumentState {
                table,
                owners: HashMap::new(),
            }),
            version: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store for piece-table documents with per-document locking.
pub struct DocumentStore {
    documents: DashMap<DocumentId, Arc<DocumentEntry>>,
    /// First document registered under each name.
    names: DashMap<String, DocumentId>,
    backend: Arc<dyn DocumentBackend>,
    config: StoreConfig,
    event_tx: broadcast::Sender<DocumentEvent>,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, config: StoreConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            documents: DashMap::new(),
            names: DashMap::new(),
            backend,
            config,
            event_tx,
        }
    }

    /// Store backed by a fresh [`MemoryBackend`].
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the event receiver for subscribing to changes.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: DocumentEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn entry(&self, document: DocumentId) -> StoreResult<Arc<DocumentEntry>> {
        self.documents
            .get(&document)
            .map(|e| Arc::clone(e.value()))
            .ok_or(StoreError::DocumentNotFound(document))
    }

    // =========================================================================
    // Document lifecycle
    // =========================================================================

    /// Create a document from text. It is not written to the backend until saved.
    pub fn create(&self, name: impl Into<String>, text: &str) -> DocumentId {
        let name = name.into();
        let id = self.insert(name.clone(), PieceTable::from_text(text));
        self.names.entry(name).or_insert(id);
        id
    }

    /// Load a document from the backend, or return the id it is already loaded under.
    ///
    /// Concurrent loads of the same name wait on each other and share one id.
    pub fn load(&self, name: &str) -> StoreResult<DocumentId> {
        match self.names.entry(name.to_string()) {
            Entry::Occupied(slot) => Ok(*slot.get()),
            Entry::Vacant(slot) => {
                let lines = self.backend.load(name)?;
                let id = self.insert(name.to_string(), PieceTable::from_lines(lines));
                slot.insert(id);
                Ok(id)
            }
        }
    }

    fn insert(&self, name: String, table: PieceTable) -> DocumentId {
        let id = DocumentId::new();
        let lines = table.len();
        tracing::info!(document = %id, name = %name, lines, "document ready");

        self.documents
            .insert(id, Arc::new(DocumentEntry::new(name.clone(), table)));
        self.emit(DocumentEvent::Created {
            document: id,
            name,
            lines,
        });
        id
    }

    /// Look up a loaded document by name.
    pub fn find(&self, name: &str) -> Option<DocumentId> {
        self.names.get(name).map(|id| *id.value())
    }

    /// Drop a document from memory. Unsaved changes are lost.
    pub fn remove(&self, document: DocumentId) -> StoreResult<()> {
        let (_, entry) = self
            .documents
            .remove(&document)
            .ok_or(StoreError::DocumentNotFound(document))?;
        self.names.remove_if(&entry.name, |_, &id| id == document);
        Ok(())
    }

    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|e| *e.key()).collect()
    }

    pub fn name(&self, document: DocumentId) -> StoreResult<String> {
        Ok(self.entry(document)?.name.clone())
    }

    pub fn version(&self, document: DocumentId) -> StoreResult<u64> {
        Ok(self.entry(document)?.version())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn len(&self, document: DocumentId) -> StoreResult<usize> {
        Ok(self.entry(document)?.state.lock().table.len())
    }

    pub fn read(&self, document: DocumentId, start: usize, length: usize) -> StoreResult<Vec<String>> {
        Ok(self.entry(document)?.state.lock().table.read(start, length)?)
    }

    pub fn stitch(&self, document: DocumentId) -> StoreResult<Vec<String>> {
        Ok(self.entry(document)?.state.lock().table.stitch()?)
    }

    pub fn snapshot(&self, document: DocumentId) -> StoreResult<TableSnapshot> {
        Ok(self.entry(document)?.state.lock().table.snapshot())
    }

    /// Human-readable table dump.
    pub fn dump(&self, document: DocumentId) -> StoreResult<String> {
        Ok(self.entry(document)?.state.lock().table.to_string())
    }

    /// Open regions in document order, with owners.
    pub fn regions(&self, document: DocumentId) -> StoreResult<Vec<RegionInfo>> {
        let entry = self.entry(document)?;
        let state = entry.state.lock();
        Ok(state
            .table
            .open_regions()
            .into_iter()
            .filter_map(|(handle, lines)| {
                state.owners.get(&handle).map(|&session| RegionInfo {
                    handle,
                    session,
                    lines,
                })
            })
            .collect())
    }

    // =========================================================================
    // Region locking
    // =========================================================================

    /// Lock `[start, start + length)` for `session`.
    pub fn open_region(
        &self,
        document: DocumentId,
        session: SessionId,
        start: usize,
        length: usize,
    ) -> StoreResult<RegionHandle> {
        let entry = self.entry(document)?;
        let handle = {
            let mut state = entry.state.lock();

            if let Some(limit) = self.config.max_regions_per_session {
                let held = state.owners.values().filter(|&&s| s == session).count();
                if held >= limit {
                    tracing::debug!(%session, held, limit, "region limit reached");
                    return Err(StoreError::RegionLimit { session, limit });
                }
            }

            let handle = state.table.open_block(start, length)?;
            state.owners.insert(handle, session);
            handle
        };
        entry.touch();

        tracing::info!(document = %document, %session, %handle, start, length, "region opened");
        self.emit(DocumentEvent::RegionOpened {
            document,
            session,
            handle,
            start,
            length,
        });
        Ok(handle)
    }

    /// Release a region held by `session`.
    ///
    /// Closing a region that is already closed is a no-op.
    pub fn close_region(
        &self,
        document: DocumentId,
        session: SessionId,
        handle: RegionHandle,
    ) -> StoreResult<()> {
        let entry = self.entry(document)?;
        {
            let mut state = entry.state.lock();
            match state.owners.get(&handle) {
                Some(&owner) if owner == session => {
                    state.table.close_block(handle)?;
                    state.owners.remove(&handle);
                }
                Some(_) => return Err(StoreError::NotOwner { handle, session }),
                None => {
                    if state.table.block(handle.block())?.is_open() {
                        return Err(StoreError::NotOwner { handle, session });
                    }
                    return Ok(());
                }
            }
        }
        entry.touch();

        tracing::info!(document = %document, %session, %handle, "region closed");
        self.emit(DocumentEvent::RegionClosed {
            document,
            session,
            handle,
        });
        Ok(())
    }

    /// Replace the content of a region held by `session`.
    pub fn edit_region(
        &self,
        document: DocumentId,
        session: SessionId,
        handle: RegionHandle,
        lines: Vec<String>,
    ) -> StoreResult<()> {
        let entry = self.entry(document)?;
        let count = lines.len();
        {
            let mut state = entry.state.lock();
            if state.owners.get(&handle).is_some_and(|&owner| owner != session) {
                return Err(StoreError::NotOwner { handle, session });
            }
            state.table.edit_block(handle, lines)?;
        }
        entry.touch();

        tracing::debug!(document = %document, %session, %handle, lines = count, "region edited");
        self.emit(DocumentEvent::RegionEdited {
            document,
            session,
            handle,
            lines: count,
        });
        Ok(())
    }

    /// Close every region `session` holds, in every document.
    ///
    /// Called when a session goes away without closing its regions.
    /// Returns how many regions were released.
    pub fn release_session(&self, session: SessionId) -> usize {
        let documents: Vec<(DocumentId, Arc<DocumentEntry>)> = self
            .documents
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();

        let mut released = 0;
        for (document, entry) in documents {
            let handles: Vec<RegionHandle> = {
                let mut state = entry.state.lock();
                let handles: Vec<RegionHandle> = state
                    .owners
                    .iter()
                    .filter(|&(_, &owner)| owner == session)
                    .map(|(&handle, _)| handle)
                    .collect();
                for handle in &handles {
                    if let Err(e) = state.table.close_block(*handle) {
                        tracing::warn!(document = %document, %handle, "failed to close region: {e}");
                    }
                    state.owners.remove(handle);
                }
                handles
            };

            if !handles.is_empty() {
                entry.touch();
            }
            for handle in handles {
                released += 1;
                self.emit(DocumentEvent::RegionClosed {
                    document,
                    session,
                    handle,
                });
            }
        }

        if released > 0 {
            tracing::info!(%session, released, "released session regions");
        }
        released
    }

    // =========================================================================
    // Compaction + persistence
    // =========================================================================

    /// Fold closed regions back into the original block. Returns the line count.
    pub fn compact(&self, document: DocumentId) -> StoreResult<usize> {
        let entry = self.entry(document)?;
        let lines = Self::compact_locked(&entry)?.len();
        entry.touch();
        self.emit(DocumentEvent::Compacted { document, lines });
        Ok(lines)
    }

    fn compact_locked(entry: &DocumentEntry) -> StoreResult<Vec<String>> {
        let mut state = entry.state.lock();
        state.table.remove_closed_blocks().map_err(|e| {
            tracing::warn!(name = %entry.name, "compaction refused: {e}");
            StoreError::from(e)
        })
    }

    /// Write the document to the backend, compacting first if configured.
    pub fn save(&self, document: DocumentId) -> StoreResult<usize> {
        let entry = self.entry(document)?;
        let lines = if self.config.compact_on_save {
            let lines = Self::compact_locked(&entry)?;
            entry.touch();
            self.emit(DocumentEvent::Compacted {
                document,
                lines: lines.len(),
            });
            lines
        } else {
            entry.state.lock().table.stitch()?
        };

        self.backend.save(&entry.name, &lines)?;

        tracing::info!(document = %document, name = %entry.name, lines = lines.len(), "document saved");
        self.emit(DocumentEvent::Saved {
            document,
            name: entry.name.clone(),
            lines: lines.len(),
        });
        Ok(lines.len())
    }
}
