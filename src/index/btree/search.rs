//! Descents from the root.

use std::fmt::Debug;

use crate::common::{Error, FileId, PageId, Result};
use crate::index::btree::bucket::{Bucket, SearchResult};
use crate::index::key::{KeyCodec, KeySerializer};
use crate::recovery::PageSource;

/// Primary index file.
pub(crate) const DATA_FILE: FileId = FileId(0);
/// Null key file.
pub(crate) const NULL_FILE: FileId = FileId(1);

pub(crate) const ENTRY_POINT: PageId = PageId(0);
pub(crate) const ROOT: PageId = PageId(1);
pub(crate) const NULL_BUCKET: PageId = PageId(0);

/// One step of a root-to-leaf path.
///
/// For internal buckets `slot` is the child position taken, for the leaf
/// it is the matching slot or the insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PathFrame {
    pub page: PageId,
    pub slot: usize,
}

impl PathFrame {
    pub fn new(page: PageId, slot: usize) -> Self {
        Self { page, slot }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    First,
    Last,
}

/// Where to continue after backtracking in [`TreeContext::edge_key`].
#[derive(Clone, Copy)]
enum Resume {
    Edge,
    At(usize),
    Exhausted,
}

/// Everything a tree algorithm needs besides pages.
pub(crate) struct TreeContext<'a, C: KeyCodec> {
    pub name: &'a str,
    pub keys: KeySerializer<'a, C>,
    pub max_depth: usize,
}

impl<C: KeyCodec> TreeContext<'_, C> {
    pub fn corrupted(&self, reason: impl Into<String>) -> Error {
        let error = Error::corruption(self.name, reason);
        tracing::warn!("{error}");
        error
    }

    fn depth_exceeded(&self, what: impl Debug) -> Error {
        self.corrupted(format!(
            "descent for {what:?} exceeded the maximum depth {}",
            self.max_depth
        ))
    }

    /// Pin a page of the primary file as a bucket.
    pub fn bucket<'s, S: PageSource>(&self, source: &'s S, page_id: PageId) -> Result<Bucket<S::Guard<'s>>> {
        let bucket = Bucket::new(source.read_page(DATA_FILE, page_id)?);
        if !bucket.is_initialized() {
            return Err(self.corrupted(format!("{page_id} is not a bucket")));
        }
        Ok(bucket)
    }

    /// Walk from the root to the leaf that holds or would hold `key`.
    pub fn descend<S: PageSource>(&self, source: &S, key: &C::Key) -> Result<(Vec<PathFrame>, SearchResult)> {
        let mut path = Vec::new();
        let mut page_id = ROOT;

        while path.len() < self.max_depth {
            let bucket = self.bucket(source, page_id)?;
            let result = bucket.find(key, &self.keys)?;
            if bucket.is_leaf() {
                path.push(PathFrame::new(page_id, result.index()));
                return Ok((path, result));
            }
            if bucket.is_empty() {
                return Err(self.corrupted(format!("internal {page_id} is empty, searching {key:?}")));
            }

            let slot = match result {
                SearchResult::Found(i) => i + 1,
                SearchResult::NotFound(i) => i,
            };
            path.push(PathFrame::new(page_id, slot));
            page_id = bucket.child(slot);
        }
        Err(self.depth_exceeded(key))
    }

    /// Leaf that holds or would hold `key`, with the slot found there.
    pub fn find_leaf<S: PageSource>(&self, source: &S, key: &C::Key) -> Result<(PageId, SearchResult)> {
        let (path, result) = self.descend(source, key)?;
        match path.last() {
            Some(leaf) => Ok((leaf.page, result)),
            None => Err(self.corrupted("descent returned an empty path")),
        }
    }

    /// Leftmost or rightmost leaf; may be empty.
    pub fn edge_leaf<S: PageSource>(&self, source: &S, edge: Edge) -> Result<PageId> {
        let mut page_id = ROOT;
        for _ in 0..self.max_depth {
            let bucket = self.bucket(source, page_id)?;
            if bucket.is_leaf() {
                return Ok(page_id);
            }
            if bucket.is_empty() {
                return Err(self.corrupted(format!("internal {page_id} is empty")));
            }
            page_id = match edge {
                Edge::First => bucket.child(0),
                Edge::Last => bucket.child(bucket.size()),
            };
        }
        Err(self.depth_exceeded(edge))
    }

    /// Smallest or largest key, stepping over empty leaves.
    ///
    /// Buckets are never merged, so the outermost leaf may be empty while
    /// keys remain further in. Visited internal buckets are kept on a stack
    /// and the walk backtracks to the next child when a subtree is empty.
    pub fn edge_key<S: PageSource>(&self, source: &S, edge: Edge) -> Result<Option<C::Key>> {
        let mut stack: Vec<(PageId, usize)> = Vec::new();
        let mut page_id = ROOT;
        let mut resume = Resume::Edge;

        loop {
            if stack.len() >= self.max_depth {
                return Err(self.depth_exceeded(edge));
            }

            let next = {
                let bucket = self.bucket(source, page_id)?;
                let size = bucket.size();
                if bucket.is_leaf() {
                    if size > 0 {
                        let index = match edge {
                            Edge::First => 0,
                            Edge::Last => size - 1,
                        };
                        return bucket.get_key(index, &self.keys).map(Some);
                    }
                    None
                } else if size == 0 {
                    None
                } else {
                    let children = size + 1;
                    let pos = match (resume, edge) {
                        (Resume::Edge, Edge::First) => Some(0),
                        (Resume::Edge, Edge::Last) => Some(size),
                        (Resume::At(pos), _) if pos < children => Some(pos),
                        _ => None,
                    };
                    pos.map(|pos| (pos, bucket.child(pos)))
                }
            };

            match next {
                Some((pos, child)) => {
                    stack.push((page_id, pos));
                    page_id = child;
                    resume = Resume::Edge;
                }
                None => {
                    let Some((parent, pos)) = stack.pop() else {
                        return Ok(None);
                    };
                    page_id = parent;
                    resume = match edge {
                        Edge::First => Resume::At(pos + 1),
                        Edge::Last => pos.checked_sub(1).map_or(Resume::Exhausted, Resume::At),
                    };
                }
            }
        }
    }
}
