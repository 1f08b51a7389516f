//! Range cursors over the leaf chain.
//!
//! A [`Cursor`] never keeps a page pinned between calls. Each batch starts
//! with a fresh descent, seeking past the last key it returned, then walks
//! leaf siblings until the batch is full or a bound is crossed.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::common::{Result, Rid};
use crate::index::btree::bucket::SearchResult;
use crate::index::btree::search::{Edge, TreeContext};
use crate::index::btree::tree::CellBTree;
use crate::index::key::KeyCodec;
use crate::recovery::PageSource;

/// One end of a key range.
#[derive(Debug, Clone)]
pub(crate) struct Bound<K> {
    pub key: K,
    pub inclusive: bool,
}

/// Entries of one prefetch round.
pub(crate) struct EntryBatch<K> {
    pub entries: VecDeque<(K, Rid)>,
    /// No entries remain beyond this batch.
    pub exhausted: bool,
}

impl<C: KeyCodec> TreeContext<'_, C> {
    fn above(&self, key: &C::Key, bound: &Bound<C::Key>) -> bool {
        match self.keys.compare(key, &bound.key) {
            Ordering::Greater => true,
            Ordering::Equal => !bound.inclusive,
            Ordering::Less => false,
        }
    }

    fn below(&self, key: &C::Key, bound: &Bound<C::Key>) -> bool {
        match self.keys.compare(key, &bound.key) {
            Ordering::Less => true,
            Ordering::Equal => !bound.inclusive,
            Ordering::Greater => false,
        }
    }

    /// Up to `limit` entries in ascending order, starting at `from`.
    pub fn forward_batch<S: PageSource>(
        &self,
        source: &S,
        from: Option<&Bound<C::Key>>,
        to: Option<&Bound<C::Key>>,
        limit: usize,
    ) -> Result<EntryBatch<C::Key>> {
        let (mut page_id, mut index) = match from {
            None => (self.edge_leaf(source, Edge::First)?, 0),
            Some(bound) => {
                let (leaf, result) = self.find_leaf(source, &bound.key)?;
                let index = match result {
                    SearchResult::Found(i) if bound.inclusive => i,
                    SearchResult::Found(i) => i + 1,
                    SearchResult::NotFound(i) => i,
                };
                (leaf, index)
            }
        };

        let mut entries = VecDeque::with_capacity(limit);
        loop {
            let bucket = self.bucket(source, page_id)?;
            while index < bucket.size() {
                if entries.len() >= limit {
                    return Ok(EntryBatch { entries, exhausted: false });
                }
                let key = bucket.get_key(index, &self.keys)?;
                if to.is_some_and(|to| self.above(&key, to)) {
                    return Ok(EntryBatch { entries, exhausted: true });
                }
                let value = bucket.get_value(index, &self.keys)?;
                entries.push_back((key, value));
                index += 1;
            }

            match bucket.right_sibling() {
                Some(next) => {
                    page_id = next;
                    index = 0;
                }
                None => return Ok(EntryBatch { entries, exhausted: true }),
            }
        }
    }

    /// Up to `limit` entries in descending order, starting at `to`.
    pub fn backward_batch<S: PageSource>(
        &self,
        source: &S,
        from: Option<&Bound<C::Key>>,
        to: Option<&Bound<C::Key>>,
        limit: usize,
    ) -> Result<EntryBatch<C::Key>> {
        // None: start at the last entry of the bucket
        let (mut page_id, mut start) = match to {
            None => (self.edge_leaf(source, Edge::Last)?, None),
            Some(bound) => {
                let (leaf, result) = self.find_leaf(source, &bound.key)?;
                let index = match result {
                    SearchResult::Found(i) if bound.inclusive => Some(i),
                    SearchResult::Found(i) | SearchResult::NotFound(i) => i.checked_sub(1),
                };
                (leaf, Some(index))
            }
        };

        let mut entries = VecDeque::with_capacity(limit);
        loop {
            let bucket = self.bucket(source, page_id)?;
            let mut next = start.unwrap_or_else(|| bucket.size().checked_sub(1));
            while let Some(index) = next {
                if entries.len() >= limit {
                    return Ok(EntryBatch { entries, exhausted: false });
                }
                let key = bucket.get_key(index, &self.keys)?;
                if from.is_some_and(|from| self.below(&key, from)) {
                    return Ok(EntryBatch { entries, exhausted: true });
                }
                let value = bucket.get_value(index, &self.keys)?;
                entries.push_back((key, value));
                next = index.checked_sub(1);
            }

            match bucket.left_sibling() {
                Some(previous) => {
                    page_id = previous;
                    start = None;
                }
                None => return Ok(EntryBatch { entries, exhausted: true }),
            }
        }
    }
}

/// Lazy, finite sequence of `(key, value)` pairs in key order.
///
/// Entries are read `prefetch_size` at a time. Changes made to the tree
/// between two batches may or may not be seen; an entry is never returned
/// twice and the cursor always terminates.
pub struct Cursor<'t, C: KeyCodec> {
    tree: &'t CellBTree<C>,
    from: Option<Bound<C::Key>>,
    to: Option<Bound<C::Key>>,
    ascending: bool,
    batch: VecDeque<(C::Key, Rid)>,
    exhausted: bool,
}

impl<'t, C: KeyCodec> Cursor<'t, C> {
    pub(crate) fn new(
        tree: &'t CellBTree<C>,
        from: Option<Bound<C::Key>>,
        to: Option<Bound<C::Key>>,
        ascending: bool,
    ) -> Self {
        Self {
            tree,
            from,
            to,
            ascending,
            batch: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fetch(&mut self) -> Result<()> {
        let batch = self
            .tree
            .fetch_batch(self.from.as_ref(), self.to.as_ref(), self.ascending)?;

        match batch.entries.back() {
            Some((last, _)) => {
                let resume = Some(Bound {
                    key: last.clone(),
                    inclusive: false,
                });
                if self.ascending {
                    self.from = resume;
                } else {
                    self.to = resume;
                }
                self.exhausted = batch.exhausted;
            }
            None => self.exhausted = true,
        }
        self.batch = batch.entries;
        Ok(())
    }
}

impl<C: KeyCodec> Iterator for Cursor<'_, C> {
    type Item = Result<(C::Key, Rid)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.batch.pop_front().map(Ok)
    }
}
