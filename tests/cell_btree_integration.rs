//! Index lifecycle across opens, crashes and threads.

mod common;

use std::sync::Arc;
use std::thread;

use cellbtree::{
    CellBTree, CompositeKey, CompositeKeyCodec, Error, IntegerKeyCodec, KeyType, StringKeyCodec,
};
use common::{init_tracing, rid, small_config};
use tempfile::tempdir;

fn load_ints(dir: &std::path::Path, name: &str) -> cellbtree::Result<CellBTree<IntegerKeyCodec>> {
    CellBTree::load(dir, name, 1, vec![], IntegerKeyCodec, None, small_config())
}

// ============================================================================
// Reopen
// ============================================================================

#[test]
fn test_close_and_load() {
    init_tracing();
    let dir = tempdir().unwrap();
    {
        let tree = CellBTree::create(dir.path(), "ids", IntegerKeyCodec, vec![], 1, None, small_config()).unwrap();
        for key in 0..500 {
            tree.put(Some(&key), rid(i64::from(key))).unwrap();
        }
        tree.put(None, rid(-1)).unwrap();
        tree.close().unwrap();
    }

    let tree = load_ints(dir.path(), "ids").unwrap();
    assert_eq!(tree.size().unwrap(), 501);
    assert_eq!(tree.get(None).unwrap(), Some(rid(-1)));
    assert_eq!(tree.first_key().unwrap(), Some(0));
    assert_eq!(tree.last_key().unwrap(), Some(499));
    for key in (0..500).step_by(37) {
        assert_eq!(tree.get(Some(&key)).unwrap(), Some(rid(i64::from(key))));
    }

    // The loaded tree keeps growing from where it stopped
    for key in 500..700 {
        tree.put(Some(&key), rid(i64::from(key))).unwrap();
    }
    let keys: Vec<i32> = tree.key_stream().map(|k| k.unwrap()).collect();
    assert_eq!(keys, (0..700).collect::<Vec<_>>());
}

#[test]
fn test_load_after_crash_replays_log() {
    init_tracing();
    let dir = tempdir().unwrap();
    {
        let tree = CellBTree::create(dir.path(), "crash", IntegerKeyCodec, vec![], 1, None, small_config()).unwrap();
        for key in 0..300 {
            tree.put(Some(&key), rid(i64::from(key))).unwrap();
        }
        for key in 100..200 {
            tree.remove(Some(&key)).unwrap();
        }
        // Dropped without close: dirty pages never reach the data file
        drop(tree);
    }

    let tree = load_ints(dir.path(), "crash").unwrap();
    assert_eq!(tree.size().unwrap(), 200);
    assert_eq!(tree.get(Some(&150)).unwrap(), None);
    assert_eq!(tree.get(Some(&250)).unwrap(), Some(rid(250)));
    let keys: Vec<i32> = tree.key_stream().map(|k| k.unwrap()).collect();
    assert_eq!(keys, (0..100).chain(200..300).collect::<Vec<_>>());
}

#[test]
fn test_composite_tree_reload() {
    init_tracing();
    let dir = tempdir().unwrap();
    let types = vec![KeyType::String, KeyType::Long];
    let key = |s: &str, n: i64| CompositeKey::new(vec![s.into(), n.into()]);
    {
        let tree = CellBTree::create(dir.path(), "pairs", CompositeKeyCodec, types.clone(), 2, None, small_config())
            .unwrap();
        for n in 0..40 {
            tree.put(Some(&key("left", n)), rid(n)).unwrap();
            tree.put(Some(&key("right", n)), rid(100 + n)).unwrap();
        }
        tree.close().unwrap();
    }

    let tree = CellBTree::load(dir.path(), "pairs", 2, types, CompositeKeyCodec, None, small_config()).unwrap();
    assert_eq!(tree.size().unwrap(), 80);
    let right = CompositeKey::new(vec!["right".into()]);
    assert_eq!(tree.get(Some(&right)).unwrap(), Some(rid(100)));
    assert_eq!(tree.iterate_entries_major(&right, true, true).unwrap().count(), 40);
}

// ============================================================================
// Load mismatches
// ============================================================================

#[test]
fn test_load_with_other_codec_fails() {
    init_tracing();
    let dir = tempdir().unwrap();
    CellBTree::create(dir.path(), "ints", IntegerKeyCodec, vec![], 1, None, small_config())
        .unwrap()
        .close()
        .unwrap();

    let wrong = CellBTree::load(dir.path(), "ints", 1, vec![], StringKeyCodec, None, small_config());
    assert!(matches!(wrong, Err(Error::InvalidConfig(_))));

    let wrong_size = CellBTree::load(dir.path(), "ints", 2, vec![], IntegerKeyCodec, None, small_config());
    assert!(matches!(wrong_size, Err(Error::InvalidConfig(_))));

    assert!(load_ints(dir.path(), "ints").is_ok());
}

#[test]
fn test_load_missing_index_fails() {
    init_tracing();
    let dir = tempdir().unwrap();
    assert!(load_ints(dir.path(), "nothing").is_err());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    init_tracing();
    let dir = tempdir().unwrap();
    let tree = Arc::new(
        CellBTree::create(dir.path(), "shared", IntegerKeyCodec, vec![], 1, None, small_config()).unwrap(),
    );

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = i * 4 + t;
                    tree.put(Some(&key), rid(i64::from(key))).unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for _ in 0..20 {
                    let keys: Vec<i32> = tree.key_stream().map(|k| k.unwrap()).collect();
                    assert!(keys.windows(2).all(|w| w[0] < w[1]));
                    for key in keys.iter().take(10) {
                        assert_eq!(tree.get(Some(key)).unwrap(), Some(rid(i64::from(*key))));
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(tree.size().unwrap(), 400);
    let keys: Vec<i32> = tree.key_stream().map(|k| k.unwrap()).collect();
    assert_eq!(keys, (0..400).collect::<Vec<_>>());
    assert_eq!(tree.pinned_pages(), 0);
}

#[test]
fn test_concurrent_removes() {
    init_tracing();
    let dir = tempdir().unwrap();
    let tree = Arc::new(
        CellBTree::create(dir.path(), "removes", IntegerKeyCodec, vec![], 1, None, small_config()).unwrap(),
    );
    for key in 0..400 {
        tree.put(Some(&key), rid(i64::from(key))).unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                (0..100)
                    .filter(|i| tree.remove(Some(&(i * 4 + t))).unwrap().is_some())
                    .count()
            })
        })
        .collect();

    let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(removed, 400);
    assert_eq!(tree.size().unwrap(), 0);
    assert_eq!(tree.first_key().unwrap(), None);
}
