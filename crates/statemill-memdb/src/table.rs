use parking_lot::{Mutex, MutexGuard, RwLock};
use statemill_core::{
    PrimaryIndexer, Query, Result, Revision, RwTable, StateError, Table, TrackerDurability, Watch,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::state::TableState;
use crate::tracker::{MemDeleteTracker, TrackerRegistry};
use crate::txn::MemTxn;

/// Validation applied to every object inserted into a table
pub type Constraint<Obj> = Arc<dyn Fn(&Obj) -> std::result::Result<(), String> + Send + Sync>;

/// Shared storage behind every handle of one table
pub(crate) struct TableCell<Obj, K> {
    name: String,
    indexer: PrimaryIndexer<Obj, K>,
    constraint: Option<Constraint<Obj>>,
    durability: TrackerDurability,
    committed: RwLock<Arc<TableState<Obj, K>>>,
    revision_tx: watch::Sender<Revision>,
    trackers: Mutex<TrackerRegistry>,
}

impl<Obj, K> TableCell<Obj, K> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn trackers(&self) -> MutexGuard<'_, TrackerRegistry> {
        self.trackers.lock()
    }
}

impl<Obj, K> TableCell<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        name: String,
        indexer: PrimaryIndexer<Obj, K>,
        constraint: Option<Constraint<Obj>>,
        durability: TrackerDurability,
    ) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            name,
            indexer,
            constraint,
            durability,
            committed: RwLock::new(Arc::new(TableState::new())),
            revision_tx,
            trackers: Mutex::new(TrackerRegistry::default()),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<TableState<Obj, K>> {
        Arc::clone(&self.committed.read())
    }

    /// Swap in a new committed state; returns whether the revision moved
    pub(crate) fn publish(&self, state: TableState<Obj, K>) -> bool {
        let revision = state.revision();
        let moved = {
            let mut committed = self.committed.write();
            let moved = committed.revision() != revision;
            *committed = Arc::new(state);
            moved
        };
        if moved {
            self.revision_tx.send_replace(revision);
        }
        moved
    }

    pub(crate) fn watch(&self, after: Revision) -> Watch {
        Watch::new(self.name.clone(), self.revision_tx.subscribe(), after)
    }

    /// Tombstones at or below the returned floor are no longer needed; the
    /// flag says whether new deletions must leave a tombstone.
    fn graveyard_policy(&self) -> (Revision, bool) {
        match self.trackers().low_watermark() {
            Some(floor) => (floor, true),
            None => (Revision::MAX, false),
        }
    }
}

/// Handle to a table in a [`MemDb`](crate::MemDb)
///
/// Handles are cheap to clone and all refer to the same table.
pub struct MemTable<Obj, K> {
    cell: Arc<TableCell<Obj, K>>,
}

impl<Obj, K> Clone for MemTable<Obj, K> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<Obj, K> fmt::Debug for MemTable<Obj, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTable")
            .field("name", &self.cell.name)
            .finish_non_exhaustive()
    }
}

impl<Obj, K> MemTable<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    pub(crate) fn from_cell(cell: Arc<TableCell<Obj, K>>) -> Self {
        Self { cell }
    }

    /// Committed contents of the table
    pub fn snapshot(&self) -> Arc<TableState<Obj, K>> {
        self.cell.snapshot()
    }

    /// Latest committed revision
    pub fn committed_revision(&self) -> Revision {
        self.cell.snapshot().revision()
    }

    /// Committed object with primary key `key`
    pub fn get(&self, key: &K) -> Option<Obj> {
        self.cell.snapshot().get(key).map(|(obj, _)| obj.clone())
    }

    /// Committed objects in primary key order
    pub fn list(&self) -> Vec<Obj> {
        self.cell
            .snapshot()
            .iter()
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cell.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell.snapshot().is_empty()
    }

    /// Ready once a commit moves the table past `after`
    pub fn watch(&self, after: Revision) -> Watch {
        self.cell.watch(after)
    }

    /// Committed cursor of the named delete tracker, if registered
    pub fn tracker_cursor(&self, name: &str) -> Option<Revision> {
        self.cell.trackers().cursor(name)
    }

    /// Number of tombstones currently retained
    pub fn graveyard_len(&self) -> usize {
        self.cell.snapshot().graveyard_len()
    }
}

impl<Obj, K> Table for MemTable<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    type Object = Obj;
    type Key = K;
    type Txn = MemTxn;
    type Tracker = MemDeleteTracker<Obj, K>;

    fn name(&self) -> &str {
        &self.cell.name
    }

    fn primary_indexer(&self) -> &PrimaryIndexer<Obj, K> {
        &self.cell.indexer
    }

    fn revision(&self, txn: &MemTxn) -> Revision {
        match txn.staged::<Obj, K>(&self.cell.name) {
            Some(state) => state.revision(),
            None => self.committed_revision(),
        }
    }

    fn first(&self, txn: &MemTxn, query: &Query<K>) -> Option<(Obj, Revision)> {
        if query.index != self.cell.indexer.name() {
            return None;
        }
        match txn.staged::<Obj, K>(&self.cell.name) {
            Some(state) => state.get(&query.key).map(|(obj, rev)| (obj.clone(), rev)),
            None => self
                .cell
                .snapshot()
                .get(&query.key)
                .map(|(obj, rev)| (obj.clone(), rev)),
        }
    }

    fn delete_tracker(&self, txn: &mut MemTxn, name: &str) -> Result<MemDeleteTracker<Obj, K>> {
        if !txn.is_locked(&self.cell.name) {
            return Err(StateError::TableNotLocked(self.cell.name.clone()));
        }

        let (id, start) = self.cell.trackers().reserve(&self.cell.name, name)?;

        let cell = Arc::clone(&self.cell);
        let tracker = name.to_string();
        txn.on_commit(move || cell.trackers().activate(&tracker, id));

        let cell = Arc::clone(&self.cell);
        let tracker = name.to_string();
        txn.on_abort(move || cell.trackers().cancel(&tracker, id));

        tracing::debug!(
            "Registered delete tracker {} on table {} from revision {}",
            name,
            self.cell.name,
            start
        );

        Ok(MemDeleteTracker::new(
            Arc::clone(&self.cell),
            name.to_string(),
            id,
            start,
            self.cell.durability,
        ))
    }
}

impl<Obj, K> RwTable for MemTable<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn insert(&self, txn: &mut MemTxn, obj: Obj) -> Result<Option<Obj>> {
        if let Some(check) = &self.cell.constraint {
            check(&obj).map_err(|reason| StateError::constraint(&self.cell.name, reason))?;
        }

        let key = self.cell.indexer.key(&obj);
        let (floor, _) = self.cell.graveyard_policy();

        let state = txn.stage_mut(&self.cell)?;
        state.prune_graveyard(floor);
        let old = state.insert(key, obj);

        txn.record_write();
        Ok(old)
    }

    fn delete(&self, txn: &mut MemTxn, obj: &Obj) -> Result<Option<Obj>> {
        let key = self.cell.indexer.key(obj);
        let (floor, keep_tombstone) = self.cell.graveyard_policy();

        let state = txn.stage_mut(&self.cell)?;
        state.prune_graveyard(floor);
        let old = state.remove(&key, keep_tombstone);

        if old.is_some() {
            txn.record_delete();
        }
        Ok(old)
    }
}
