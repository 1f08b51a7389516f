//! Null bucket - the single page of the null key file.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 13      1     present (i8)
//! 14      2     cluster id (i16), valid when present
//! 16      8     cluster position (i64), valid when present
//! ```

use std::ops::{Deref, DerefMut};

use crate::common::Rid;
use crate::storage::page::{Page, PageHeader, PageType};

const PRESENT_OFFSET: usize = PageHeader::SIZE;
const VALUE_OFFSET: usize = PRESENT_OFFSET + 1;

pub struct NullBucket<P> {
    page: P,
}

impl<P: Deref<Target = Page>> NullBucket<P> {
    pub fn new(page: P) -> Self {
        Self { page }
    }

    pub fn value(&self) -> Option<Rid> {
        (self.page.get_i8(PRESENT_OFFSET) > 0)
            .then(|| Rid::from_bytes(self.page.get_bytes(VALUE_OFFSET, Rid::SIZE)))
    }
}

impl<P: DerefMut<Target = Page>> NullBucket<P> {
    pub fn init(&mut self) {
        self.page.set_page_type(PageType::NullBucket);
        self.page.set_i8(PRESENT_OFFSET, 0);
    }

    pub fn set_value(&mut self, rid: Rid) {
        self.page.set_i8(PRESENT_OFFSET, 1);
        self.page.set_bytes(VALUE_OFFSET, &rid.to_bytes());
    }

    pub fn remove_value(&mut self) {
        self.page.set_i8(PRESENT_OFFSET, 0);
    }
}
