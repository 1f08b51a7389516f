//! File identifier type.

use std::fmt;

/// Identifies one of the files owned by a [`DurableStore`].
///
/// The id is the position of the file in the list the store was opened
/// with, so it is stable across restarts as long as the list is.
///
/// [`DurableStore`]: crate::recovery::DurableStore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new FileId.
    #[inline]
    pub fn new(id: u32) -> Self {
        FileId(id)
    }

    /// Position of the file inside its store.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_index() {
        assert_eq!(FileId::new(3).index(), 3);
    }

    #[test]
    fn test_file_id_display() {
        assert_eq!(format!("{}", FileId::new(1)), "File(1)");
    }
}
