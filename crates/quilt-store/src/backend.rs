//! Persistence backends: where documents come from and go to.
//!
//! The store only ever hands a backend whole documents as line lists, taken
//! from `stitch` or compaction. Backends never see the piece table.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

use quilt_table::split_lines;

use crate::{StoreError, StoreResult};

/// Durable storage for documents, addressed by name.
pub trait DocumentBackend: Send + Sync {
    /// Read a document as lines, each keeping its terminator.
    fn load(&self, name: &str) -> StoreResult<Vec<String>>;

    /// Replace a document's stored content.
    fn save(&self, name: &str, lines: &[String]) -> StoreResult<()>;

    fn exists(&self, name: &str) -> bool;
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory backend. Used for tests and scratch documents; all data is
/// lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly.
    pub fn insert(&self, name: impl Into<String>, text: impl Into<String>) {
        self.documents.write().insert(name.into(), text.into());
    }

    /// Raw stored text, if any.
    pub fn get(&self, name: &str) -> Option<String> {
        self.documents.read().get(name).cloned()
    }
}

impl DocumentBackend for MemoryBackend {
    fn load(&self, name: &str) -> StoreResult<Vec<String>> {
        let documents = self.documents.read();
        let text = documents.get(name).ok_or_else(|| {
            StoreError::Backend(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no document named {name}"),
            ))
        })?;
        Ok(split_lines(text))
    }

    fn save(&self, name: &str, lines: &[String]) -> StoreResult<()> {
        self.documents.write().insert(name.to_string(), lines.concat());
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.documents.read().contains_key(name)
    }
}

// ============================================================================
// Filesystem backend
// ============================================================================

/// Filesystem backend. Document names are paths relative to `root`.
///
/// Names may not be absolute or contain `..`. Saves write a sibling temp
/// file and rename it over the target, so a crash mid-write leaves the old
/// content in place.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a document name to a path inside the root.
    fn resolve(&self, name: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(name);
        let mut saw_file = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => saw_file = true,
                Component::CurDir => {}
                _ => return Err(StoreError::InvalidName(name.to_string())),
            }
        }
        if !saw_file {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentBackend for FsBackend {
    fn load(&self, name: &str) -> StoreResult<Vec<String>> {
        let path = self.resolve(name)?;
        let text = std::fs::read_to_string(&path)?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "loaded document");
        Ok(split_lines(&text))
    }

    fn save(&self, name: &str, lines: &[String]) -> StoreResult<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| StoreError::InvalidName(name.to_string()))?
            .to_string_lossy();
        let temp = path.with_file_name(format!(".{file_name}.quilt-tmp"));

        let text = lines.concat();
        std::fs::write(&temp, &text)?;
        std::fs::rename(&temp, &path)?;

        tracing::debug!(path = %path.display(), bytes = text.len(), "saved document");
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_memory_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(!backend.exists("notes"));
        backend.save("notes", &lines(&["a\n", "b"])).unwrap();
        assert!(backend.exists("notes"));
        assert_eq!(backend.get("notes").unwrap(), "a\nb");
        assert_eq!(backend.load("notes").unwrap(), lines(&["a\n", "b"]));
    }

    #[test]
    fn test_memory_missing_is_not_found() {
        let backend = MemoryBackend::new();
        match backend.load("absent") {
            Err(StoreError::Backend(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_fs_roundtrip_with_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        let content = lines(&["first\n", "second\r\n", "third"]);

        backend.save("docs/readme.txt", &content).unwrap();
        assert!(backend.exists("docs/readme.txt"));
        assert_eq!(backend.load("docs/readme.txt").unwrap(), content);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("docs/readme.txt")).unwrap(),
            "first\nsecond\r\nthird"
        );
        assert!(!dir.path().join("docs/.readme.txt.quilt-tmp").exists());
    }

    #[test]
    fn test_fs_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        for name in ["../outside.txt", "/etc/passwd", "", ".", "a/../../b"] {
            assert!(
                matches!(backend.load(name), Err(StoreError::InvalidName(_))),
                "{name:?} should be rejected"
            );
            assert!(!backend.exists(name));
        }
    }

    #[test]
    fn test_fs_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        assert!(matches!(backend.load("nope.txt"), Err(StoreError::Backend(_))));
    }
}
