use statemill_core::{
    Change, DeleteTracker, ProcessError, Processed, Result, Revision, StateError,
    TrackerDurability,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::table::TableCell;
use crate::txn::MemTxn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackerStatus {
    /// Registered by an uncommitted transaction
    Pending,
    Active,
    /// Closed durable tracker; its cursor is kept for the next registration
    Released,
}

#[derive(Debug, Clone)]
struct TrackerEntry {
    id: u64,
    status: TrackerStatus,
    cursor: Revision,
    resumed: bool,
}

/// Bookkeeping for the delete trackers of one table
///
/// Every registration gets a fresh id; updates carrying a stale id are
/// ignored so a closed tracker can never touch a later registration of the
/// same name.
#[derive(Debug, Default)]
pub(crate) struct TrackerRegistry {
    entries: HashMap<String, TrackerEntry>,
    next_id: u64,
}

impl TrackerRegistry {
    /// Reserve `name`; returns the registration id and the resume cursor
    pub(crate) fn reserve(&mut self, table: &str, name: &str) -> Result<(u64, Revision)> {
        self.next_id += 1;
        let id = self.next_id;

        match self.entries.get_mut(name) {
            Some(entry) if entry.status == TrackerStatus::Released => {
                entry.id = id;
                entry.status = TrackerStatus::Pending;
                entry.resumed = true;
                Ok((id, entry.cursor))
            }
            Some(_) => Err(StateError::TrackerExists {
                table: table.to_string(),
                name: name.to_string(),
            }),
            None => {
                self.entries.insert(
                    name.to_string(),
                    TrackerEntry {
                        id,
                        status: TrackerStatus::Pending,
                        cursor: 0,
                        resumed: false,
                    },
                );
                Ok((id, 0))
            }
        }
    }

    pub(crate) fn activate(&mut self, name: &str, id: u64) {
        if let Some(entry) = self.entry_mut(name, id) {
            if entry.status == TrackerStatus::Pending {
                entry.status = TrackerStatus::Active;
            }
        }
    }

    /// Undo a reservation whose transaction was aborted
    pub(crate) fn cancel(&mut self, name: &str, id: u64) {
        let Some(entry) = self.entry_mut(name, id) else {
            return;
        };
        if entry.status != TrackerStatus::Pending {
            return;
        }
        if entry.resumed {
            entry.status = TrackerStatus::Released;
        } else {
            self.entries.remove(name);
        }
    }

    pub(crate) fn advance(&mut self, name: &str, id: u64, revision: Revision) {
        if let Some(entry) = self.entry_mut(name, id) {
            entry.cursor = entry.cursor.max(revision);
        }
    }

    pub(crate) fn release(&mut self, name: &str, id: u64, durability: TrackerDurability) {
        if self.entry_mut(name, id).is_none() {
            return;
        }
        match durability {
            TrackerDurability::Ephemeral => {
                self.entries.remove(name);
            }
            TrackerDurability::Durable => {
                if let Some(entry) = self.entries.get_mut(name) {
                    entry.status = TrackerStatus::Released;
                }
            }
        }
    }

    /// Lowest cursor over all registrations, `None` when nothing tracks the table
    pub(crate) fn low_watermark(&self) -> Option<Revision> {
        self.entries.values().map(|e| e.cursor).min()
    }

    pub(crate) fn cursor(&self, name: &str) -> Option<Revision> {
        self.entries.get(name).map(|e| e.cursor)
    }

    #[cfg(test)]
    pub(crate) fn status(&self, name: &str) -> Option<TrackerStatus> {
        self.entries.get(name).map(|e| e.status)
    }

    fn entry_mut(&mut self, name: &str, id: u64) -> Option<&mut TrackerEntry> {
        self.entries.get_mut(name).filter(|e| e.id == id)
    }
}

/// Delete tracker over a [`MemTable`](crate::MemTable)
///
/// Reads the committed state of its table; progress is staged on the
/// transaction passed to `process` and lands only if that transaction
/// commits. Closed on drop.
pub struct MemDeleteTracker<Obj, K> {
    cell: Arc<TableCell<Obj, K>>,
    name: String,
    id: u64,
    start: Revision,
    durability: TrackerDurability,
    closed: bool,
}

impl<Obj, K> MemDeleteTracker<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        cell: Arc<TableCell<Obj, K>>,
        name: String,
        id: u64,
        start: Revision,
        durability: TrackerDurability,
    ) -> Self {
        Self {
            cell,
            name,
            id,
            start,
            durability,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn stage_advance(&self, txn: &mut MemTxn, revision: Revision) {
        let cell = Arc::clone(&self.cell);
        let name = self.name.clone();
        let id = self.id;
        txn.on_commit(move || cell.trackers().advance(&name, id, revision));
    }
}

impl<Obj, K> DeleteTracker for MemDeleteTracker<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + Send + Sync + 'static,
{
    type Object = Obj;
    type Txn = MemTxn;

    fn name(&self) -> &str {
        &self.name
    }

    fn start_revision(&self) -> Revision {
        self.start
    }

    fn process<F>(
        &mut self,
        txn: &mut MemTxn,
        from: Revision,
        mut on_change: F,
    ) -> std::result::Result<Processed, ProcessError>
    where
        F: FnMut(&mut MemTxn, Change<Obj>) -> Result<()>,
    {
        if self.closed {
            return Err(ProcessError {
                revision: from,
                processed: 0,
                source: StateError::Transaction(format!(
                    "delete tracker {} on {} is closed",
                    self.name,
                    self.cell.name()
                )),
            });
        }

        let snapshot = self.cell.snapshot();
        let mut reached = from;
        let mut processed = 0;

        for change in snapshot.changes_after(from) {
            let revision = change.revision;
            if let Err(source) = on_change(txn, change) {
                self.stage_advance(txn, reached);
                return Err(ProcessError {
                    revision: reached,
                    processed,
                    source,
                });
            }
            reached = revision;
            processed += 1;
        }

        // Revisions without a deliverable change (e.g. superseded writes)
        // are covered by the snapshot revision.
        let revision = reached.max(snapshot.revision());
        self.stage_advance(txn, revision);

        Ok(Processed {
            revision,
            processed,
            watch: self.cell.watch(revision),
        })
    }

    fn close(&mut self) {
        if !self.release() {
            return;
        }
        tracing::debug!(
            "Closed delete tracker {} on table {}",
            self.name,
            self.cell.name()
        );
    }
}

impl<Obj, K> MemDeleteTracker<Obj, K> {
    /// Returns false if the tracker was already closed
    fn release(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.cell.trackers().release(&self.name, self.id, self.durability);
        true
    }
}

impl<Obj, K> fmt::Debug for MemDeleteTracker<Obj, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemDeleteTracker")
            .field("table", &self.cell.name())
            .field("name", &self.name)
            .field("start", &self.start)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<Obj, K> Drop for MemDeleteTracker<Obj, K> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_rejects_duplicate() {
        let mut registry = TrackerRegistry::default();
        registry.reserve("devices", "derive").unwrap();
        let err = registry.reserve("devices", "derive").unwrap_err();
        assert!(matches!(err, StateError::TrackerExists { .. }));
    }

    #[test]
    fn test_cancel_frees_name() {
        let mut registry = TrackerRegistry::default();
        let (id, _) = registry.reserve("devices", "derive").unwrap();
        registry.cancel("derive", id);
        assert_eq!(registry.status("derive"), None);
        assert!(registry.reserve("devices", "derive").is_ok());
    }

    #[test]
    fn test_stale_id_is_ignored() {
        let mut registry = TrackerRegistry::default();
        let (old, _) = registry.reserve("devices", "derive").unwrap();
        registry.release("derive", old, TrackerDurability::Ephemeral);

        let (new, _) = registry.reserve("devices", "derive").unwrap();
        registry.activate("derive", new);
        registry.release("derive", old, TrackerDurability::Ephemeral);
        registry.advance("derive", old, 10);

        assert_eq!(registry.status("derive"), Some(TrackerStatus::Active));
        assert_eq!(registry.cursor("derive"), Some(0));
    }

    #[test]
    fn test_durable_release_keeps_cursor() {
        let mut registry = TrackerRegistry::default();
        let (id, _) = registry.reserve("devices", "derive").unwrap();
        registry.activate("derive", id);
        registry.advance("derive", id, 7);
        registry.advance("derive", id, 3);
        registry.release("derive", id, TrackerDurability::Durable);

        assert_eq!(registry.status("derive"), Some(TrackerStatus::Released));
        assert_eq!(registry.low_watermark(), Some(7));

        let (id, start) = registry.reserve("devices", "derive").unwrap();
        assert_eq!(start, 7);

        // aborted resume parks the tracker again
        registry.cancel("derive", id);
        assert_eq!(registry.status("derive"), Some(TrackerStatus::Released));
    }

    #[test]
    fn test_low_watermark() {
        let mut registry = TrackerRegistry::default();
        assert_eq!(registry.low_watermark(), None);

        let (a, _) = registry.reserve("devices", "a").unwrap();
        let (b, _) = registry.reserve("devices", "b").unwrap();
        registry.advance("a", a, 5);
        registry.advance("b", b, 9);
        assert_eq!(registry.low_watermark(), Some(5));

        registry.release("a", a, TrackerDurability::Ephemeral);
        assert_eq!(registry.low_watermark(), Some(9));
    }
}
