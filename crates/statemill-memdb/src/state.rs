use statemill_core::{Change, Revision};
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone)]
struct Versioned<Obj> {
    object: Obj,
    revision: Revision,
}

/// Immutable-once-published contents of a table
///
/// Live objects and tombstones are each indexed by primary key and by
/// revision. Every insert and every effective delete takes the next table
/// revision, so revisions are unique across both sets.
#[derive(Debug, Clone)]
pub struct TableState<Obj, K> {
    revision: Revision,
    objects: BTreeMap<K, Versioned<Obj>>,
    by_revision: BTreeMap<Revision, K>,
    graveyard: BTreeMap<K, Versioned<Obj>>,
    graveyard_by_revision: BTreeMap<Revision, K>,
}

impl<Obj, K> Default for TableState<Obj, K> {
    fn default() -> Self {
        Self {
            revision: 0,
            objects: BTreeMap::new(),
            by_revision: BTreeMap::new(),
            graveyard: BTreeMap::new(),
            graveyard_by_revision: BTreeMap::new(),
        }
    }
}

impl<Obj: Clone, K: Ord + Clone> TableState<Obj, K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of tombstones retained for delete trackers
    pub fn graveyard_len(&self) -> usize {
        self.graveyard.len()
    }

    pub fn get(&self, key: &K) -> Option<(&Obj, Revision)> {
        self.objects.get(key).map(|v| (&v.object, v.revision))
    }

    /// Live objects in primary key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Obj)> {
        self.objects.iter().map(|(k, v)| (k, &v.object))
    }

    pub(crate) fn insert(&mut self, key: K, object: Obj) -> Option<Obj> {
        self.revision += 1;
        let revision = self.revision;

        self.by_revision.insert(revision, key.clone());
        let old = self.objects.insert(key, Versioned { object, revision })?;
        self.by_revision.remove(&old.revision);
        Some(old.object)
    }

    pub(crate) fn remove(&mut self, key: &K, keep_tombstone: bool) -> Option<Obj> {
        let old = self.objects.remove(key)?;
        self.by_revision.remove(&old.revision);

        self.revision += 1;
        let revision = self.revision;

        if keep_tombstone {
            let tombstone = Versioned {
                object: old.object.clone(),
                revision,
            };
            if let Some(prev) = self.graveyard.insert(key.clone(), tombstone) {
                self.graveyard_by_revision.remove(&prev.revision);
            }
            self.graveyard_by_revision.insert(revision, key.clone());
        }
        Some(old.object)
    }

    /// Drop tombstones at or below `floor`; returns how many were dropped
    pub(crate) fn prune_graveyard(&mut self, floor: Revision) -> usize {
        let keep = match floor.checked_add(1) {
            Some(first_kept) => self.graveyard_by_revision.split_off(&first_kept),
            None => BTreeMap::new(),
        };
        let pruned = std::mem::replace(&mut self.graveyard_by_revision, keep);
        for key in pruned.values() {
            self.graveyard.remove(key);
        }
        pruned.len()
    }

    /// Live objects and tombstones written after `from`, in revision order
    pub fn changes_after(&self, from: Revision) -> Vec<Change<Obj>> {
        let range = (Bound::Excluded(from), Bound::Unbounded);

        let mut live = self
            .by_revision
            .range(range)
            .filter_map(|(rev, key)| {
                self.objects
                    .get(key)
                    .map(|v| Change::live(v.object.clone(), *rev))
            })
            .peekable();
        let mut dead = self
            .graveyard_by_revision
            .range(range)
            .filter_map(|(rev, key)| {
                self.graveyard
                    .get(key)
                    .map(|v| Change::tombstone(v.object.clone(), *rev))
            })
            .peekable();

        let mut changes = Vec::new();
        loop {
            let take_live = match (live.peek(), dead.peek()) {
                (Some(l), Some(d)) => l.revision < d.revision,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_live { live.next() } else { dead.next() };
            changes.extend(next);
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revisions(changes: &[Change<&'static str>]) -> Vec<(Revision, bool)> {
        changes.iter().map(|c| (c.revision, c.deleted)).collect()
    }

    #[test]
    fn test_insert_replaces_and_bumps_revision() {
        let mut state = TableState::new();
        assert_eq!(state.insert(1, "a"), None);
        assert_eq!(state.insert(1, "b"), Some("a"));
        assert_eq!(state.revision(), 2);
        assert_eq!(state.get(&1), Some((&"b", 2)));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut state: TableState<&str, u32> = TableState::new();
        assert_eq!(state.remove(&1, true), None);
        assert_eq!(state.revision(), 0);
        assert_eq!(state.graveyard_len(), 0);
    }

    #[test]
    fn test_changes_merge_live_and_tombstones() {
        let mut state = TableState::new();
        state.insert(1, "a"); // rev 1
        state.insert(2, "b"); // rev 2
        state.remove(&1, true); // rev 3
        state.insert(3, "c"); // rev 4
        state.insert(2, "b2"); // rev 5

        let changes = state.changes_after(0);
        assert_eq!(revisions(&changes), vec![(3, true), (4, false), (5, false)]);
        assert_eq!(changes[0].object, "a");

        let changes = state.changes_after(3);
        assert_eq!(revisions(&changes), vec![(4, false), (5, false)]);
    }

    #[test]
    fn test_reinsert_after_delete_keeps_tombstone_first() {
        let mut state = TableState::new();
        state.insert(1, "a"); // rev 1
        state.remove(&1, true); // rev 2
        state.insert(1, "a2"); // rev 3

        let changes = state.changes_after(0);
        assert_eq!(revisions(&changes), vec![(2, true), (3, false)]);
    }

    #[test]
    fn test_repeated_delete_replaces_tombstone() {
        let mut state = TableState::new();
        state.insert(1, "a"); // rev 1
        state.remove(&1, true); // rev 2
        state.insert(1, "a2"); // rev 3
        state.remove(&1, true); // rev 4

        assert_eq!(state.graveyard_len(), 1);
        let changes = state.changes_after(0);
        assert_eq!(revisions(&changes), vec![(4, true)]);
        assert_eq!(changes[0].object, "a2");
    }

    #[test]
    fn test_prune_graveyard() {
        let mut state = TableState::new();
        for k in 0..4u32 {
            state.insert(k, "x");
        }
        state.remove(&0, true); // rev 5
        state.remove(&1, true); // rev 6
        state.remove(&2, true); // rev 7

        assert_eq!(state.prune_graveyard(6), 2);
        assert_eq!(state.graveyard_len(), 1);
        assert_eq!(state.prune_graveyard(Revision::MAX), 1);
        assert_eq!(state.graveyard_len(), 0);
    }
}
