//! Ancestor bookkeeping for orphan-folder cleanup
//!
//! While the listing is consumed, every dataset seen upstream pins its
//! ancestor folders. Afterwards, the ancestors of unmatched datasets that were
//! never pinned are the folders to delete. Both walks go through
//! [`DatasetKey::ancestors_below`] the pass root, so they always agree on what
//! an ancestor is and the root itself is never a candidate.

use core_catalog::DatasetKey;
use std::collections::HashSet;

/// Folders that must survive this pass
#[derive(Debug)]
pub struct AncestryTracker {
    root: DatasetKey,
    keep: HashSet<DatasetKey>,
}

impl AncestryTracker {
    /// Tracker for folders strictly beneath `root`
    pub fn new(root: DatasetKey) -> Self {
        Self {
            root,
            keep: HashSet::new(),
        }
    }

    /// Pin every ancestor of `key`
    pub fn track(&mut self, key: &DatasetKey) {
        for ancestor in key.ancestors_below(&self.root) {
            // chains are always pinned whole, so the rest is already here
            if !self.keep.insert(ancestor) {
                break;
            }
        }
    }

    pub fn should_keep(&self, folder: &DatasetKey) -> bool {
        self.keep.contains(folder)
    }

    /// Ancestors of an unmatched key that nothing pinned, nearest first
    pub fn deletion_candidates<'a>(
        &'a self,
        orphan: &'a DatasetKey,
    ) -> impl Iterator<Item = DatasetKey> + 'a {
        orphan
            .ancestors_below(&self.root)
            .filter(move |ancestor| !self.should_keep(ancestor))
    }

    /// Number of pinned folders
    pub fn len(&self) -> usize {
        self.keep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keep.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> DatasetKey {
        DatasetKey::parse(path).unwrap()
    }

    #[test]
    fn test_track_pins_chain_without_root() {
        let mut tracker = AncestryTracker::new(key("src"));
        tracker.track(&key("src.a.b.t"));

        assert!(tracker.should_keep(&key("src.a.b")));
        assert!(tracker.should_keep(&key("src.a")));
        assert!(!tracker.should_keep(&key("src")));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_track_shared_prefix() {
        let mut tracker = AncestryTracker::new(key("src"));
        tracker.track(&key("src.a.b.t1"));
        tracker.track(&key("src.a.c.t2"));

        assert!(tracker.should_keep(&key("src.a.c")));
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_deletion_candidates_skip_pinned() {
        let mut tracker = AncestryTracker::new(key("src"));
        tracker.track(&key("src.a.keep"));

        let candidates: Vec<_> = tracker.deletion_candidates(&key("src.a.x.gone")).collect();
        assert_eq!(candidates, vec![key("src.a.x")]);

        let top_level: Vec<_> = tracker.deletion_candidates(&key("src.gone")).collect();
        assert!(top_level.is_empty());
    }

    #[test]
    fn test_deletion_candidates_when_nothing_pinned() {
        let tracker = AncestryTracker::new(key("x"));
        assert!(tracker.is_empty());
        let candidates: Vec<_> = tracker.deletion_candidates(&key("x.y.z")).collect();
        assert_eq!(candidates, vec![key("x.y")]);
    }

    #[test]
    fn test_nested_root_is_never_a_candidate() {
        let mut tracker = AncestryTracker::new(key("space.src"));
        tracker.track(&key("space.src.f.keep"));

        assert!(tracker.should_keep(&key("space.src.f")));
        assert!(!tracker.should_keep(&key("space.src")));
        assert_eq!(tracker.len(), 1);

        assert_eq!(tracker.deletion_candidates(&key("space.src.t")).count(), 0);
        let candidates: Vec<_> = tracker
            .deletion_candidates(&key("space.src.g.h.t"))
            .collect();
        assert_eq!(candidates, vec![key("space.src.g.h"), key("space.src.g")]);
    }
}
