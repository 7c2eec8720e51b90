use statemill_core::{observe, CommitInfo, Result, StateError, WriteTxn};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::state::TableState;
use crate::table::TableCell;

type Hook = Box<dyn FnOnce() + Send>;

/// A table copy modified inside a transaction, published on commit
pub(crate) trait Staged: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Make the staged state the committed state; returns whether the
    /// table revision moved
    fn publish(self: Box<Self>) -> bool;
}

struct StagedTable<Obj, K> {
    cell: Arc<TableCell<Obj, K>>,
    state: TableState<Obj, K>,
}

impl<Obj, K> Staged for StagedTable<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn publish(self: Box<Self>) -> bool {
        let StagedTable { cell, state } = *self;
        cell.publish(state)
    }
}

/// Transaction statistics
#[derive(Default)]
struct TxnStats {
    objects_written: usize,
    objects_deleted: usize,
}

/// Write transaction over a set of locked tables
///
/// Writes go to private copies of the touched tables. `commit` publishes
/// every copy and then runs the commit hooks; `abort` or dropping the
/// transaction discards them and runs the abort hooks. Table locks are held
/// until the transaction is gone.
pub struct MemTxn {
    locks: Vec<(String, OwnedMutexGuard<()>)>,
    staged: HashMap<String, Box<dyn Staged>>,
    on_commit: Vec<Hook>,
    on_abort: Vec<Hook>,
    stats: TxnStats,
    finished: bool,
}

impl MemTxn {
    pub(crate) fn new(locks: Vec<(String, OwnedMutexGuard<()>)>) -> Self {
        Self {
            locks,
            staged: HashMap::new(),
            on_commit: Vec::new(),
            on_abort: Vec::new(),
            stats: TxnStats::default(),
            finished: false,
        }
    }

    /// Whether this transaction holds the write lock for `table`
    pub fn is_locked(&self, table: &str) -> bool {
        self.locks.iter().any(|(name, _)| name == table)
    }

    /// Names of the locked tables, sorted
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.locks.iter().map(|(name, _)| name.as_str())
    }

    /// Run `hook` once the transaction has been published
    pub fn on_commit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_commit.push(Box::new(hook));
    }

    /// Run `hook` if the transaction is aborted or dropped
    pub fn on_abort(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_abort.push(Box::new(hook));
    }

    pub(crate) fn staged<Obj, K>(&self, table: &str) -> Option<&TableState<Obj, K>>
    where
        Obj: Clone + Send + Sync + 'static,
        K: Ord + Clone + Send + Sync + 'static,
    {
        self.staged
            .get(table)?
            .as_any()
            .downcast_ref::<StagedTable<Obj, K>>()
            .map(|staged| &staged.state)
    }

    /// Copy-on-first-write access to a table's state
    pub(crate) fn stage_mut<Obj, K>(
        &mut self,
        cell: &Arc<TableCell<Obj, K>>,
    ) -> Result<&mut TableState<Obj, K>>
    where
        Obj: Clone + Send + Sync + 'static,
        K: Ord + Clone + Send + Sync + 'static,
    {
        let name = cell.name();
        if !self.is_locked(name) {
            return Err(StateError::TableNotLocked(name.to_string()));
        }

        self.staged
            .entry(name.to_string())
            .or_insert_with(|| -> Box<dyn Staged> {
                Box::new(StagedTable {
                    cell: Arc::clone(cell),
                    state: (*cell.snapshot()).clone(),
                })
            })
            .as_any_mut()
            .downcast_mut::<StagedTable<Obj, K>>()
            .map(|staged| &mut staged.state)
            .ok_or_else(|| {
                StateError::Transaction(format!("table {} staged with another object type", name))
            })
    }

    pub(crate) fn record_write(&mut self) {
        self.stats.objects_written += 1;
    }

    pub(crate) fn record_delete(&mut self) {
        self.stats.objects_deleted += 1;
    }

    fn rollback(&mut self) {
        self.finished = true;
        self.staged.clear();
        self.on_commit.clear();
        for hook in std::mem::take(&mut self.on_abort) {
            hook();
        }
    }
}

impl fmt::Debug for MemTxn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTxn")
            .field("tables", &self.tables().collect::<Vec<_>>())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl WriteTxn for MemTxn {
    fn commit(mut self) -> Result<CommitInfo> {
        if self.finished {
            return Err(StateError::Transaction("Transaction already finished".into()));
        }
        self.finished = true;

        let mut tables_written = 0;
        for (_, table) in std::mem::take(&mut self.staged) {
            if table.publish() {
                tables_written += 1;
            }
        }

        self.on_abort.clear();
        for hook in std::mem::take(&mut self.on_commit) {
            hook();
        }

        observe::record_commit(self.stats.objects_written, self.stats.objects_deleted);

        Ok(CommitInfo {
            tables_written,
            objects_written: self.stats.objects_written,
            objects_deleted: self.stats.objects_deleted,
        })
    }

    fn abort(mut self) {
        self.rollback();
    }
}

impl Drop for MemTxn {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback();
        }
    }
}
