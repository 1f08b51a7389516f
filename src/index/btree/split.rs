//! Bucket splits and page allocation.
//!
//! A split takes the root-to-leaf path recorded by a descent and returns a
//! new path whose last frame names the bucket and slot that now receive the
//! pending insertion. Full parents are split recursively with the same
//! routine before they take the new separator.

use crate::common::{PageId, Result};
use crate::index::btree::bucket::Bucket;
use crate::index::btree::entry_point::EntryPoint;
use crate::index::btree::search::{PathFrame, TreeContext, DATA_FILE, ENTRY_POINT, ROOT};
use crate::index::key::KeyCodec;
use crate::recovery::{AtomicOperation, ShadowPage};

impl<C: KeyCodec> TreeContext<'_, C> {
    /// Hand out a page for a new bucket.
    ///
    /// Pages up to the entry point's `pages_size` belong to the tree. A page
    /// beyond it that already exists in the file was left behind by an
    /// aborted operation and is reused before the file grows.
    pub fn allocate_page(&self, op: &mut AtomicOperation<'_>) -> Result<(PageId, ShadowPage)> {
        let mut entry = EntryPoint::new(op.load_page_for_write(DATA_FILE, ENTRY_POINT)?);
        let next = entry.pages_size() + 1;

        let (page_id, page) = if next < op.page_count(DATA_FILE)? {
            (PageId(next), op.load_page_for_write(DATA_FILE, PageId(next))?)
        } else {
            op.add_page(DATA_FILE)?
        };
        entry.set_pages_size(page_id.0);
        Ok((page_id, page))
    }

    /// Split the last bucket of `path`.
    pub fn split_bucket(&self, op: &mut AtomicOperation<'_>, mut path: Vec<PathFrame>) -> Result<Vec<PathFrame>> {
        let frame = path
            .pop()
            .ok_or_else(|| self.corrupted("split requested without a path"))?;

        let mut bucket = Bucket::new(op.load_page_for_write(DATA_FILE, frame.page)?);
        let is_leaf = bucket.is_leaf();
        let size = bucket.size();
        if size < 2 {
            return Err(self.corrupted(format!(
                "{} holds {size} entries and can not be split",
                frame.page
            )));
        }

        let middle = size / 2;
        // An internal median moves up instead of being copied
        let start_right = if is_leaf { middle } else { middle + 1 };
        let separator = bucket.key_bytes(middle, &self.keys)?.to_vec();
        let right_entries = (start_right..size)
            .map(|i| bucket.get_raw_entry(i, &self.keys))
            .collect::<Result<Vec<_>>>()?;

        if path.is_empty() {
            if frame.page != ROOT {
                return Err(self.corrupted(format!("path to {} does not start at the root", frame.page)));
            }

            let left_entries = (0..middle)
                .map(|i| bucket.get_raw_entry(i, &self.keys))
                .collect::<Result<Vec<_>>>()?;
            let (left_id, left_page) = self.allocate_page(op)?;
            let (right_id, right_page) = self.allocate_page(op)?;

            let mut left = Bucket::new(left_page);
            left.init(is_leaf);
            left.add_all(&left_entries)?;
            let mut right = Bucket::new(right_page);
            right.init(is_leaf);
            right.add_all(&right_entries)?;
            if is_leaf {
                left.set_right_sibling(Some(right_id));
                right.set_left_sibling(Some(left_id));
            }

            bucket.shrink(0, &self.keys)?;
            if is_leaf {
                bucket.switch_bucket_type();
            }
            if !bucket.add_internal_entry(0, left_id, right_id, &separator, true) {
                return Err(self.corrupted("separator does not fit into an empty root"));
            }
            tracing::debug!(
                "index '{}': root split into {left_id} and {right_id} ({} entries)",
                self.name,
                size
            );

            return Ok(if frame.slot <= middle {
                vec![PathFrame::new(ROOT, 0), PathFrame::new(left_id, frame.slot)]
            } else {
                vec![
                    PathFrame::new(ROOT, 1),
                    PathFrame::new(right_id, frame.slot - start_right),
                ]
            });
        }

        let (right_id, right_page) = self.allocate_page(op)?;
        let mut right = Bucket::new(right_page);
        right.init(is_leaf);
        right.add_all(&right_entries)?;
        if is_leaf {
            let old_right = bucket.right_sibling();
            right.set_left_sibling(Some(frame.page));
            right.set_right_sibling(old_right);
            bucket.set_right_sibling(Some(right_id));
            if let Some(next) = old_right {
                let mut next_bucket = Bucket::new(op.load_page_for_write(DATA_FILE, next)?);
                next_bucket.set_left_sibling(Some(right_id));
            }
        }
        bucket.shrink(middle, &self.keys)?;
        drop(bucket);
        drop(right);
        tracing::debug!(
            "index '{}': split {} at slot {middle}, new right sibling {right_id}",
            self.name,
            frame.page
        );

        let mut parents = path;
        loop {
            let parent = *parents
                .last()
                .ok_or_else(|| self.corrupted("split lost its parent path"))?;
            let mut parent_bucket = Bucket::new(op.load_page_for_write(DATA_FILE, parent.page)?);
            if parent_bucket.add_internal_entry(parent.slot, frame.page, right_id, &separator, true) {
                break;
            }
            drop(parent_bucket);
            parents = self.split_bucket(op, parents)?;
        }

        if frame.slot <= middle {
            parents.push(PathFrame::new(frame.page, frame.slot));
        } else {
            if let Some(parent) = parents.last_mut() {
                parent.slot += 1;
            }
            parents.push(PathFrame::new(right_id, frame.slot - start_right));
        }
        Ok(parents)
    }
}
