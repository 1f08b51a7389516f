//! The single-value B+Tree index.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Error, IndexConfig, Result, Rid};
use crate::index::btree::bucket::{Bucket, SearchResult};
use crate::index::btree::cursor::{Bound, Cursor, EntryBatch};
use crate::index::btree::entry_point::EntryPoint;
use crate::index::btree::null_bucket::NullBucket;
use crate::index::btree::search::{
    Edge, TreeContext, DATA_FILE, ENTRY_POINT, NULL_BUCKET, NULL_FILE, ROOT,
};
use crate::index::key::{Encryption, KeyCodec, KeySerializer, KeyType, PartialSearchMode};
use crate::recovery::{AtomicOperation, DurableStore};

const DATA_EXTENSION: &str = "cbt";
const NULL_EXTENSION: &str = "nbt";
const WAL_EXTENSION: &str = "wal";

/// Outcome of a `validated_put` validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Store this value (which may differ from the proposed one).
    Accept(Rid),
    /// Leave the index untouched; the put reports `false`.
    Ignore,
}

/// A disk-resident B+Tree mapping keys to a single [`Rid`].
///
/// # Files
/// ```text
/// <name>.cbt   entry point (page 0), root bucket (page 1), other buckets
/// <name>.nbt   null bucket (page 0), the value of the null key
/// <name>.wal   write-ahead log shared by both
/// ```
///
/// # Concurrency
/// Lookups, cursors and `size` take the tree lock shared; `put`,
/// `validated_put`, `remove` and `clear` take it exclusive. Each mutation
/// runs as one atomic unit: after a crash either all of its page changes
/// are visible or none are.
///
/// Cursors fetch entries in batches and re-seek by the last returned key
/// for every batch, so they see concurrent changes made between batches.
///
/// # Example
/// ```no_run
/// use cellbtree::{CellBTree, IndexConfig, IntegerKeyCodec, Rid};
///
/// let tree = CellBTree::create(
///     "/tmp/idx", "people_age", IntegerKeyCodec, vec![], 1, None, IndexConfig::default(),
/// )?;
/// tree.put(Some(&42), Rid::new(3, 100))?;
/// assert_eq!(tree.get(Some(&42))?, Some(Rid::new(3, 100)));
/// tree.close()?;
/// # Ok::<(), cellbtree::Error>(())
/// ```
pub struct CellBTree<C: KeyCodec> {
    name: String,
    codec: C,
    key_types: Vec<KeyType>,
    key_size: usize,
    encryption: Option<Arc<dyn Encryption>>,
    config: IndexConfig,
    store: DurableStore,
    lock: RwLock<()>,
}

fn index_files(dir: &Path, name: &str) -> (Vec<PathBuf>, PathBuf) {
    (
        vec![
            dir.join(format!("{name}.{DATA_EXTENSION}")),
            dir.join(format!("{name}.{NULL_EXTENSION}")),
        ],
        dir.join(format!("{name}.{WAL_EXTENSION}")),
    )
}

fn check_key_size(key_size: usize, key_types: &[KeyType]) -> Result<()> {
    if key_size == 0 {
        return Err(Error::InvalidConfig("key size must be > 0".into()));
    }
    if !key_types.is_empty() && key_types.len() != key_size {
        return Err(Error::InvalidConfig(format!(
            "{} key types declared for key size {key_size}",
            key_types.len()
        )));
    }
    Ok(())
}

impl<C: KeyCodec> CellBTree<C> {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create the index files in `dir`.
    ///
    /// `key_size` is the number of components of every stored key (1 for
    /// scalar keys). `key_types` is either empty or one type per component.
    pub fn create(
        dir: impl AsRef<Path>,
        name: &str,
        codec: C,
        key_types: Vec<KeyType>,
        key_size: usize,
        encryption: Option<Arc<dyn Encryption>>,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        check_key_size(key_size, &key_types)?;

        let (files, wal) = index_files(dir.as_ref(), name);
        let store = DurableStore::create(&files, &wal, &config)?;
        let codec_id = codec.id();

        store.run_in_atomic_unit(|op| {
            let (entry_id, entry_page) = op.add_page(DATA_FILE)?;
            let (root_id, root_page) = op.add_page(DATA_FILE)?;
            let (null_id, null_page) = op.add_page(NULL_FILE)?;
            if (entry_id, root_id, null_id) != (ENTRY_POINT, ROOT, NULL_BUCKET) {
                return Err(Error::corruption(name, "fresh index files are not empty"));
            }

            EntryPoint::new(entry_page).init(codec_id, key_size);
            Bucket::new(root_page).init(true);
            NullBucket::new(null_page).init();
            Ok(())
        })?;

        tracing::info!(
            "created index '{name}' in {} (codec {codec_id}, key size {key_size}, encrypted: {})",
            dir.as_ref().display(),
            encryption.is_some()
        );
        Ok(Self {
            name: name.to_string(),
            codec,
            key_types,
            key_size,
            encryption,
            config,
            store,
            lock: RwLock::new(()),
        })
    }

    /// Open existing index files, recovering committed work from the log.
    pub fn load(
        dir: impl AsRef<Path>,
        name: &str,
        key_size: usize,
        key_types: Vec<KeyType>,
        codec: C,
        encryption: Option<Arc<dyn Encryption>>,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        check_key_size(key_size, &key_types)?;

        let (files, wal) = index_files(dir.as_ref(), name);
        let (store, recovered) = DurableStore::open(&files, &wal, &config)?;

        {
            let entry = EntryPoint::new(store.read_page(DATA_FILE, ENTRY_POINT)?);
            if !entry.is_initialized() {
                return Err(Error::InvalidConfig(format!("index '{name}' has no entry point")));
            }
            if entry.key_serializer_id() != codec.id() {
                return Err(Error::InvalidConfig(format!(
                    "index '{name}' was written with key codec {}, not {}",
                    entry.key_serializer_id(),
                    codec.id()
                )));
            }
            if entry.key_size() != key_size {
                return Err(Error::InvalidConfig(format!(
                    "index '{name}' stores keys of {} components, not {key_size}",
                    entry.key_size()
                )));
            }
        }
        if store.page_count(NULL_FILE)? == 0 {
            return Err(Error::InvalidConfig(format!("index '{name}' has no null bucket")));
        }

        tracing::info!(
            "loaded index '{name}' from {} ({} operations recovered)",
            dir.as_ref().display(),
            recovered.operations_replayed
        );
        Ok(Self {
            name: name.to_string(),
            codec,
            key_types,
            key_size,
            encryption,
            config,
            store,
            lock: RwLock::new(()),
        })
    }

    /// Checkpoint and close the index.
    pub fn close(self) -> Result<()> {
        self.store.close()?;
        tracing::info!("closed index '{}'", self.name);
        Ok(())
    }

    /// Remove the index files.
    ///
    /// # Errors
    /// `Error::NotEmptyOnDelete` if the index still holds entries; the index
    /// is closed in that case and its files are kept.
    pub fn delete(self) -> Result<()> {
        let size = self.size()?;
        if size > 0 {
            self.store.checkpoint()?;
            return Err(Error::NotEmptyOnDelete {
                index: self.name,
                size,
            });
        }

        self.store.destroy()?;
        tracing::info!("deleted index '{}'", self.name);
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn key_types(&self) -> &[KeyType] {
        &self.key_types
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Pages currently pinned in the page caches of this index.
    pub fn pinned_pages(&self) -> u32 {
        self.store.total_pins()
    }

    fn context(&self) -> TreeContext<'_, C> {
        TreeContext {
            name: &self.name,
            keys: KeySerializer::new(&self.codec, self.encryption.as_deref()),
            max_depth: self.config.max_depth,
        }
    }

    fn invalid_key(&self, key: &C::Key, reason: impl Into<String>) -> Error {
        Error::InvalidKey {
            index: self.name.clone(),
            key: format!("{key:?}"),
            reason: reason.into(),
        }
    }

    fn preprocess(&self, key: &C::Key) -> Result<C::Key> {
        let key = self
            .codec
            .preprocess(key.clone(), &self.key_types)
            .map_err(|reason| self.invalid_key(key, reason))?;
        let arity = self.codec.arity(&key);
        if arity > self.key_size {
            return Err(self.invalid_key(&key, format!(
                "key has {arity} components, index stores {}",
                self.key_size
            )));
        }
        Ok(key)
    }

    /// Preprocess a key that is about to be stored or removed.
    ///
    /// Only keys with exactly `key_size` components are accepted, an empty
    /// composite key would compare equal to every stored key.
    fn full_key(&self, key: &C::Key) -> Result<C::Key> {
        let key = self.preprocess(key)?;
        if self.is_partial(&key) {
            return Err(self.invalid_key(&key, format!(
                "key has {} components, index stores {}",
                self.codec.arity(&key),
                self.key_size
            )));
        }
        Ok(key)
    }

    fn is_partial(&self, key: &C::Key) -> bool {
        self.codec.arity(key) < self.key_size
    }

    /// Preprocess a range bound, padding partial keys.
    fn search_key(&self, key: &C::Key, mode: PartialSearchMode) -> Result<C::Key> {
        let key = self.preprocess(key)?;
        Ok(if self.is_partial(&key) {
            self.codec.pad_partial(key, self.key_size, mode)
        } else {
            key
        })
    }

    fn add_to_size(&self, op: &mut AtomicOperation<'_>, delta: i64) -> Result<()> {
        let mut entry = EntryPoint::new(op.load_page_for_write(DATA_FILE, ENTRY_POINT)?);
        let size = entry
            .tree_size()
            .checked_add_signed(delta)
            .ok_or_else(|| Error::corruption(&self.name, "tree size would become negative"))?;
        entry.set_tree_size(size);
        Ok(())
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    /// Value stored under `key`; `None` addresses the null key.
    ///
    /// A composite key with fewer components than the index matches the
    /// first stored key that starts with it.
    pub fn get(&self, key: Option<&C::Key>) -> Result<Option<Rid>> {
        let Some(key) = key else {
            let _guard = self.lock.read();
            return Ok(NullBucket::new(self.store.read_page(NULL_FILE, NULL_BUCKET)?).value());
        };

        let key = self.preprocess(key)?;
        if self.is_partial(&key) {
            let first = self.iterate_entries_major(&key, true, true)?.next().transpose()?;
            return Ok(first
                .filter(|(found, _)| self.codec.compare(found, &key) == Ordering::Equal)
                .map(|(_, rid)| rid));
        }

        let _guard = self.lock.read();
        let context = self.context();
        let (leaf, result) = context.find_leaf(&self.store, &key)?;
        match result {
            SearchResult::Found(index) => context
                .bucket(&self.store, leaf)?
                .get_value(index, &context.keys)
                .map(Some),
            SearchResult::NotFound(_) => Ok(None),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn put(&self, key: Option<&C::Key>, value: Rid) -> Result<()> {
        self.validated_put(key, value, |_, _, value| Ok(Validation::Accept(value)))
            .map(|_| ())
    }

    /// Store `value` under `key` if `validator` agrees.
    ///
    /// The validator sees the key, the value currently stored (if any) and
    /// the proposed value. It may substitute another value or ask to leave
    /// the index untouched, in which case this returns `Ok(false)`.
    ///
    /// # Errors
    /// - `Error::KeyTooLarge` before any page is touched
    /// - `Error::InvalidKey` if the key does not match the key types
    /// - `Error::StructuralCorruption` if the tree is damaged
    /// - any error returned by the validator
    pub fn validated_put<F>(&self, key: Option<&C::Key>, value: Rid, validator: F) -> Result<bool>
    where
        F: FnOnce(Option<&C::Key>, Option<Rid>, Rid) -> Result<Validation>,
    {
        let Some(key) = key else {
            return self.put_null(value, validator);
        };

        let key = self.full_key(key)?;
        let context = self.context();
        let raw = context.keys.serialize(&key)?;
        if raw.len() > self.config.max_key_size {
            return Err(Error::KeyTooLarge {
                index: self.name.clone(),
                key: format!("{key:?}"),
                size: raw.len(),
                max: self.config.max_key_size,
            });
        }

        let _guard = self.lock.write();
        self.store.run_in_atomic_unit(|op| {
            let (mut path, result) = context.descend(&*op, &key)?;
            let Some(leaf) = path.last().copied() else {
                return Err(context.corrupted("descent returned an empty path"));
            };

            let old = match result {
                SearchResult::Found(index) => Some(
                    context
                        .bucket(&*op, leaf.page)?
                        .get_value(index, &context.keys)?,
                ),
                SearchResult::NotFound(_) => None,
            };
            let value = match validator(Some(&key), old, value)? {
                Validation::Accept(value) => value,
                Validation::Ignore => return Ok(false),
            };

            // Values have a fixed width, an existing entry is updated in place
            if let SearchResult::Found(index) = result {
                let mut bucket = Bucket::new(op.load_page_for_write(DATA_FILE, leaf.page)?);
                bucket.update_value(index, &value, &context.keys)?;
                return Ok(true);
            }

            let value = value.to_bytes();
            loop {
                let Some(target) = path.last().copied() else {
                    return Err(context.corrupted("split returned an empty path"));
                };
                let mut bucket = Bucket::new(op.load_page_for_write(DATA_FILE, target.page)?);
                if bucket.add_leaf_entry(target.slot, &raw, &value) {
                    break;
                }
                drop(bucket);
                path = context.split_bucket(op, path)?;
            }
            self.add_to_size(op, 1)?;
            Ok(true)
        })
    }

    fn put_null<F>(&self, value: Rid, validator: F) -> Result<bool>
    where
        F: FnOnce(Option<&C::Key>, Option<Rid>, Rid) -> Result<Validation>,
    {
        let _guard = self.lock.write();
        self.store.run_in_atomic_unit(|op| {
            let old = NullBucket::new(op.load_page_for_read(NULL_FILE, NULL_BUCKET)?).value();
            let value = match validator(None, old, value)? {
                Validation::Accept(value) => value,
                Validation::Ignore => return Ok(false),
            };

            NullBucket::new(op.load_page_for_write(NULL_FILE, NULL_BUCKET)?).set_value(value);
            if old.is_none() {
                self.add_to_size(op, 1)?;
            }
            Ok(true)
        })
    }

    /// Remove `key`, returning the value it held.
    pub fn remove(&self, key: Option<&C::Key>) -> Result<Option<Rid>> {
        let Some(key) = key else {
            return self.remove_null();
        };

        let key = self.full_key(key)?;
        let context = self.context();
        let _guard = self.lock.write();
        self.store.run_in_atomic_unit(|op| {
            let (leaf, result) = context.find_leaf(&*op, &key)?;
            let SearchResult::Found(index) = result else {
                return Ok(None);
            };

            let mut bucket = Bucket::new(op.load_page_for_write(DATA_FILE, leaf)?);
            let removed = bucket.get_value(index, &context.keys)?;
            bucket.remove_leaf_entry(index, &context.keys)?;
            drop(bucket);

            self.add_to_size(op, -1)?;
            Ok(Some(removed))
        })
    }

    fn remove_null(&self) -> Result<Option<Rid>> {
        let _guard = self.lock.write();
        self.store.run_in_atomic_unit(|op| {
            let old = NullBucket::new(op.load_page_for_read(NULL_FILE, NULL_BUCKET)?).value();
            if old.is_some() {
                NullBucket::new(op.load_page_for_write(NULL_FILE, NULL_BUCKET)?).remove_value();
                self.add_to_size(op, -1)?;
            }
            Ok(old)
        })
    }

    /// Number of stored keys, the null key included.
    pub fn size(&self) -> Result<u64> {
        let _guard = self.lock.read();
        Ok(EntryPoint::new(self.store.read_page(DATA_FILE, ENTRY_POINT)?).tree_size())
    }

    /// Remove every entry. Pages stay allocated to the tree.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.write();
        self.store.run_in_atomic_unit(|op| {
            Bucket::new(op.load_page_for_write(DATA_FILE, ROOT)?).init(true);
            NullBucket::new(op.load_page_for_write(NULL_FILE, NULL_BUCKET)?).remove_value();
            EntryPoint::new(op.load_page_for_write(DATA_FILE, ENTRY_POINT)?).set_tree_size(0);
            Ok(())
        })?;
        tracing::info!("cleared index '{}'", self.name);
        Ok(())
    }

    // ========================================================================
    // Ordered access
    // ========================================================================

    /// Smallest non-null key.
    pub fn first_key(&self) -> Result<Option<C::Key>> {
        let _guard = self.lock.read();
        self.context().edge_key(&self.store, Edge::First)
    }

    /// Largest non-null key.
    pub fn last_key(&self) -> Result<Option<C::Key>> {
        let _guard = self.lock.read();
        self.context().edge_key(&self.store, Edge::Last)
    }

    /// Entries with keys between `from` and `to`.
    pub fn iterate_entries_between(
        &self,
        from: &C::Key,
        from_inclusive: bool,
        to: &C::Key,
        to_inclusive: bool,
        ascending: bool,
    ) -> Result<Cursor<'_, C>> {
        let from = self.lower_bound(from, from_inclusive)?;
        let to = self.upper_bound(to, to_inclusive)?;
        Ok(Cursor::new(self, Some(from), Some(to), ascending))
    }

    /// Entries with keys below `to`.
    pub fn iterate_entries_minor(&self, to: &C::Key, inclusive: bool, ascending: bool) -> Result<Cursor<'_, C>> {
        let to = self.upper_bound(to, inclusive)?;
        Ok(Cursor::new(self, None, Some(to), ascending))
    }

    /// Entries with keys above `from`.
    pub fn iterate_entries_major(&self, from: &C::Key, inclusive: bool, ascending: bool) -> Result<Cursor<'_, C>> {
        let from = self.lower_bound(from, inclusive)?;
        Ok(Cursor::new(self, Some(from), None, ascending))
    }

    /// Every non-null entry in ascending key order.
    pub fn all_entries(&self) -> Cursor<'_, C> {
        Cursor::new(self, None, None, true)
    }

    /// Every non-null key in ascending order.
    pub fn key_stream(&self) -> impl Iterator<Item = Result<C::Key>> + '_ {
        self.all_entries().map(|entry| entry.map(|(key, _)| key))
    }

    fn lower_bound(&self, key: &C::Key, inclusive: bool) -> Result<Bound<C::Key>> {
        let mode = if inclusive {
            PartialSearchMode::LowestBoundary
        } else {
            PartialSearchMode::HighestBoundary
        };
        Ok(Bound {
            key: self.search_key(key, mode)?,
            inclusive,
        })
    }

    fn upper_bound(&self, key: &C::Key, inclusive: bool) -> Result<Bound<C::Key>> {
        let mode = if inclusive {
            PartialSearchMode::HighestBoundary
        } else {
            PartialSearchMode::LowestBoundary
        };
        Ok(Bound {
            key: self.search_key(key, mode)?,
            inclusive,
        })
    }

    /// Next batch of a cursor, read under the shared lock.
    pub(crate) fn fetch_batch(
        &self,
        from: Option<&Bound<C::Key>>,
        to: Option<&Bound<C::Key>>,
        ascending: bool,
    ) -> Result<EntryBatch<C::Key>> {
        let _guard = self.lock.read();
        let context = self.context();
        if ascending {
            context.forward_batch(&self.store, from, to, self.config.prefetch_size)
        } else {
            context.backward_batch(&self.store, from, to, self.config.prefetch_size)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::key::{CompositeKey, CompositeKeyCodec, IntegerKeyCodec, StringKeyCodec};
    use tempfile::{tempdir, TempDir};

    fn config() -> IndexConfig {
        IndexConfig::default()
            .with_page_size(256)
            .with_max_key_size(32)
            .with_sync_on_commit(false)
    }

    fn int_tree() -> (TempDir, CellBTree<IntegerKeyCodec>) {
        let dir = tempdir().unwrap();
        let tree = CellBTree::create(dir.path(), "ints", IntegerKeyCodec, vec![], 1, None, config()).unwrap();
        (dir, tree)
    }

    fn rid(n: i32) -> Rid {
        Rid::new(1, i64::from(n))
    }

    #[test]
    fn test_empty_tree() {
        let (_dir, tree) = int_tree();
        assert_eq!(tree.size().unwrap(), 0);
        assert_eq!(tree.get(Some(&1)).unwrap(), None);
        assert_eq!(tree.first_key().unwrap(), None);
        assert_eq!(tree.last_key().unwrap(), None);
        assert_eq!(tree.all_entries().count(), 0);
    }

    #[test]
    fn test_put_get_update() {
        let (_dir, tree) = int_tree();
        tree.put(Some(&5), rid(50)).unwrap();
        tree.put(Some(&1), rid(10)).unwrap();
        assert_eq!(tree.get(Some(&5)).unwrap(), Some(rid(50)));
        assert_eq!(tree.size().unwrap(), 2);

        tree.put(Some(&5), rid(55)).unwrap();
        assert_eq!(tree.get(Some(&5)).unwrap(), Some(rid(55)));
        assert_eq!(tree.size().unwrap(), 2);
    }

    #[test]
    fn test_root_split_keeps_everything() {
        let (_dir, tree) = int_tree();
        // A 256 byte leaf holds 12 integer entries
        for key in 0..13 {
            tree.put(Some(&key), rid(key)).unwrap();
        }

        let root = tree.context().bucket(&tree.store, ROOT).unwrap().is_leaf();
        assert!(!root);
        for key in 0..13 {
            assert_eq!(tree.get(Some(&key)).unwrap(), Some(rid(key)));
        }
        assert_eq!(tree.first_key().unwrap(), Some(0));
        assert_eq!(tree.last_key().unwrap(), Some(12));
    }

    #[test]
    fn test_remove() {
        let (_dir, tree) = int_tree();
        for key in 0..40 {
            tree.put(Some(&key), rid(key)).unwrap();
        }
        assert_eq!(tree.remove(Some(&7)).unwrap(), Some(rid(7)));
        assert_eq!(tree.remove(Some(&7)).unwrap(), None);
        assert_eq!(tree.get(Some(&7)).unwrap(), None);
        assert_eq!(tree.size().unwrap(), 39);
    }

    #[test]
    fn test_edge_keys_skip_empty_leaves() {
        let (_dir, tree) = int_tree();
        for key in 0..60 {
            tree.put(Some(&key), rid(key)).unwrap();
        }
        for key in (0..20).chain(45..60) {
            tree.remove(Some(&key)).unwrap();
        }
        assert_eq!(tree.first_key().unwrap(), Some(20));
        assert_eq!(tree.last_key().unwrap(), Some(44));
    }

    #[test]
    fn test_shuffled_inserts_grow_three_levels() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let (_dir, tree) = int_tree();
        let mut keys: Vec<i32> = (0..1500).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(7));
        for key in &keys {
            tree.put(Some(key), rid(*key)).unwrap();
        }

        let context = tree.context();
        for probe in [0, 749, 1499] {
            let (path, result) = context.descend(&tree.store, &probe).unwrap();
            assert!(path.len() >= 3, "depth {} for key {probe}", path.len());
            assert!(result.is_found());
        }
        assert_eq!(tree.size().unwrap(), 1500);
    }

    #[test]
    fn test_allocation_reuses_orphaned_pages() {
        let (_dir, tree) = int_tree();
        for key in 0..13 {
            tree.put(Some(&key), rid(key)).unwrap();
        }
        let pages_before = tree.store.page_count(DATA_FILE).unwrap();

        // An aborted unit leaves a zero page behind the tree's pages
        let result: Result<()> = tree.store.run_in_atomic_unit(|op| {
            tree.context().allocate_page(op)?;
            Err(Error::Codec("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(tree.store.page_count(DATA_FILE).unwrap(), pages_before + 1);

        let reused = tree
            .store
            .run_in_atomic_unit(|op| tree.context().allocate_page(op).map(|(id, _)| id))
            .unwrap();
        assert_eq!(reused.0, pages_before);
        assert_eq!(tree.store.page_count(DATA_FILE).unwrap(), pages_before + 1);
    }

    #[test]
    fn test_string_keys() {
        let dir = tempdir().unwrap();
        let tree = CellBTree::create(dir.path(), "words", StringKeyCodec, vec![], 1, None, config()).unwrap();
        let words = ["delta", "alpha", "echo", "charlie", "bravo"];
        for (i, word) in words.iter().enumerate() {
            tree.put(Some(&word.to_string()), rid(i as i32)).unwrap();
        }

        let keys: Vec<String> = tree.key_stream().map(|k| k.unwrap()).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta", "echo"]);
    }

    #[test]
    fn test_partial_key_get() {
        let dir = tempdir().unwrap();
        let tree = CellBTree::create(
            dir.path(),
            "pairs",
            CompositeKeyCodec,
            vec![KeyType::String, KeyType::Integer],
            2,
            None,
            config(),
        )
        .unwrap();
        tree.put(Some(&CompositeKey::new(vec!["B".into(), 2i32.into()])), rid(2)).unwrap();
        tree.put(Some(&CompositeKey::new(vec!["B".into(), 1i32.into()])), rid(1)).unwrap();

        assert_eq!(tree.get(Some(&CompositeKey::new(vec!["B".into()]))).unwrap(), Some(rid(1)));
        assert_eq!(tree.get(Some(&CompositeKey::new(vec!["C".into()]))).unwrap(), None);
        assert!(matches!(
            tree.put(Some(&CompositeKey::new(vec!["C".into()])), rid(3)),
            Err(Error::InvalidKey { .. })
        ));
        assert!(matches!(
            tree.remove(Some(&CompositeKey::new(vec!["B".into()]))),
            Err(Error::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_invalid_key_size_configuration() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            CellBTree::create(dir.path(), "bad", IntegerKeyCodec, vec![], 0, None, config()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            CellBTree::create(
                dir.path(),
                "bad2",
                CompositeKeyCodec,
                vec![KeyType::Integer],
                2,
                None,
                config()
            ),
            Err(Error::InvalidConfig(_))
        ));
    }
}
