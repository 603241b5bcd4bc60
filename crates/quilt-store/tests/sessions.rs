//! End-to-end store behavior: racing sessions and disk persistence.

use std::sync::{Arc, Barrier};
use std::time::Duration;

use quilt_store::{
    DocumentBackend, DocumentStore, FsBackend, MemoryBackend, StoreConfig, StoreError, StoreResult,
};
use quilt_types::SessionId;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("quilt_store=debug,quilt_table=debug")
        .with_test_writer()
        .try_init();
}

fn numbered(n: usize) -> String {
    (0..n).map(|i| format!("line {i}\n")).collect()
}

#[test]
fn test_racing_sessions_get_exclusive_regions() {
    init_tracing();
    let store = Arc::new(DocumentStore::in_memory(StoreConfig::default()));
    let doc = store.create("race", &numbered(100));

    // Every thread asks for an overlapping window around line 50.
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let winners: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    let session = SessionId::new();
                    barrier.wait();
                    store.open_region(doc, session, 45 + i, 10).is_ok()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(winners.iter().filter(|&&won| won).count(), 1);
    assert_eq!(store.regions(doc).unwrap().len(), 1);
    assert_eq!(store.stitch(doc).unwrap().concat(), numbered(100));
}

/// Backend whose loads take long enough for callers to overlap.
struct SlowBackend {
    inner: MemoryBackend,
    delay: Duration,
}

impl DocumentBackend for SlowBackend {
    fn load(&self, name: &str) -> StoreResult<Vec<String>> {
        std::thread::sleep(self.delay);
        self.inner.load(name)
    }

    fn save(&self, name: &str, lines: &[String]) -> StoreResult<()> {
        self.inner.save(name, lines)
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }
}

#[test]
fn test_racing_loads_share_one_document() {
    init_tracing();
    let inner = MemoryBackend::new();
    inner.insert("f.txt", numbered(10));
    let backend = SlowBackend {
        inner,
        delay: Duration::from_millis(50),
    };
    let store = Arc::new(DocumentStore::new(Arc::new(backend), StoreConfig::default()));

    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));
    let ids: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    barrier.wait();
                    store.load("f.txt").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.iter().all(|&id| id == ids[0]));
    assert_eq!(store.list_ids(), vec![ids[0]]);

    // One document means one lock: overlapping opens still conflict.
    store.open_region(ids[0], SessionId::new(), 2, 3).unwrap();
    assert!(store.open_region(ids[1], SessionId::new(), 3, 3).is_err());
}

#[test]
fn test_disjoint_sessions_all_succeed() {
    init_tracing();
    let store = Arc::new(DocumentStore::in_memory(StoreConfig::default()));
    let doc = store.create("lanes", &numbered(80));

    // Positions shift once edits land, so every lane opens before any edits.
    let lanes = 8;
    let opened = Arc::new(Barrier::new(lanes));
    std::thread::scope(|scope| {
        for lane in 0..lanes {
            let store = Arc::clone(&store);
            let opened = Arc::clone(&opened);
            scope.spawn(move || {
                let session = SessionId::new();
                let handle = store.open_region(doc, session, lane * 10, 10).unwrap();
                opened.wait();
                let content: Vec<String> = (0..3).map(|k| format!("lane {lane}.{k}\n")).collect();
                store.edit_region(doc, session, handle, content).unwrap();
                store.close_region(doc, session, handle).unwrap();
            });
        }
    });

    assert_eq!(store.len(doc).unwrap(), 24);
    let lines = store.stitch(doc).unwrap();
    for lane in 0..lanes {
        assert_eq!(lines[lane * 3], format!("lane {lane}.0\n"));
    }
    store.compact(doc).unwrap();
    assert_eq!(store.snapshot(doc).unwrap().entries.len(), 1);
}

#[test]
fn test_fs_save_and_reload() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("doc.txt"), "a\nb\nc\nd\ne\n").unwrap();

    let store = DocumentStore::new(
        Arc::new(FsBackend::new(dir.path())),
        StoreConfig::default(),
    );
    let doc = store.load("doc.txt").unwrap();
    let alice = SessionId::new();
    let bob = SessionId::new();

    let a = store.open_region(doc, alice, 1, 2).unwrap();
    let b = store.open_region(doc, bob, 4, 1).unwrap();
    store.edit_region(doc, alice, a, vec!["B\n".into(), "C\n".into(), "C2\n".into()]).unwrap();
    store.close_region(doc, alice, a).unwrap();

    store.save(doc).unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("doc.txt")).unwrap(),
        "a\nB\nC\nC2\nd\ne\n"
    );

    // Bob's lock outlives the save and tracks the shifted position.
    let regions = store.regions(doc).unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].handle, b);
    assert_eq!(regions[0].lines, 5..6);

    let fresh = DocumentStore::new(Arc::new(FsBackend::new(dir.path())), StoreConfig::default());
    let reloaded = fresh.load("doc.txt").unwrap();
    assert_eq!(fresh.stitch(reloaded).unwrap().concat(), "a\nB\nC\nC2\nd\ne\n");
}

#[test]
fn test_load_missing_and_invalid_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(Arc::new(FsBackend::new(dir.path())), StoreConfig::default());
    assert!(matches!(store.load("missing.txt"), Err(StoreError::Backend(_))));
    assert!(matches!(store.load("../escape.txt"), Err(StoreError::InvalidName(_))));
}
