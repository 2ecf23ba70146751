//! Corpus Locator - opaque occurrence handle

use serde::{Deserialize, Serialize};
use std::fmt;

pub type EntryId = u32;

/// Position of one data point inside one corpus entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorpusLocator {
    entry: EntryId,
    offset: u32,
}

impl CorpusLocator {
    pub fn new(entry: EntryId, offset: u32) -> Self {
        Self { entry, offset }
    }

    pub fn entry(&self) -> EntryId {
        self.entry
    }

    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    /// Next position in the same entry
    pub fn advance(&self) -> Self {
        self.advance_by(1)
    }

    pub fn advance_by(&self, steps: usize) -> Self {
        Self {
            entry: self.entry,
            offset: self.offset.saturating_add(steps as u32),
        }
    }

    /// True when `next` is the position right after this one
    pub fn is_followed_by(&self, next: &CorpusLocator) -> bool {
        self.entry == next.entry && self.offset.checked_add(1) == Some(next.offset)
    }
}

impl fmt::Display for CorpusLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entry, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_and_adjacency() {
        let loc = CorpusLocator::new(3, 7);
        let next = loc.advance();

        assert_eq!(next, CorpusLocator::new(3, 8));
        assert!(loc.is_followed_by(&next));
        assert!(!next.is_followed_by(&loc));
        assert!(!loc.is_followed_by(&CorpusLocator::new(4, 8)));
        assert_eq!(loc.advance_by(3).offset(), 10);
    }
}
