use async_trait::async_trait;
use parking_lot::RwLock;
use statemill_core::{observe, MemDbConfig, PrimaryIndexer, Result, StateError, StateStore};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::table::{Constraint, MemTable, TableCell};
use crate::txn::MemTxn;

struct DbInner {
    config: MemDbConfig,
    // One writer per table
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

/// In-memory table store
///
/// Tables are created through [`MemDb::table`]. Write transactions lock a
/// set of tables exclusively; locks are always taken in table-name order,
/// so two transactions over overlapping sets cannot deadlock.
///
/// Cloning a `MemDb` yields another handle to the same database.
#[derive(Clone)]
pub struct MemDb {
    inner: Arc<DbInner>,
}

impl MemDb {
    pub fn new(config: MemDbConfig) -> Self {
        Self {
            inner: Arc::new(DbInner {
                config,
                locks: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &MemDbConfig {
        &self.inner.config
    }

    /// Start defining a table keyed by `indexer`
    pub fn table<Obj, K>(
        &self,
        name: impl Into<String>,
        indexer: PrimaryIndexer<Obj, K>,
    ) -> TableBuilder<Obj, K> {
        TableBuilder {
            db: self.clone(),
            name: name.into(),
            indexer,
            constraint: None,
        }
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.locks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a table; later transactions naming it fail with `TableUnavailable`
    ///
    /// Existing handles keep working on the detached table.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.inner
            .locks
            .write()
            .remove(name)
            .map(|_| tracing::info!("Dropped table {}", name))
            .ok_or_else(|| StateError::TableUnavailable(name.to_string()))
    }
}

impl Default for MemDb {
    fn default() -> Self {
        Self::new(MemDbConfig::default())
    }
}

impl fmt::Debug for MemDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemDb")
            .field("config", &self.inner.config)
            .field("tables", &self.table_names())
            .finish()
    }
}

#[async_trait]
impl StateStore for MemDb {
    type Txn = MemTxn;

    async fn write_txn(&self, tables: &[&str]) -> Result<MemTxn> {
        let mut names: Vec<&str> = tables.to_vec();
        names.sort_unstable();
        names.dedup();

        let locks = {
            let registry = self.inner.locks.read();
            names
                .iter()
                .map(|name| {
                    registry
                        .get(*name)
                        .map(|lock| (name.to_string(), Arc::clone(lock)))
                        .ok_or_else(|| StateError::TableUnavailable(name.to_string()))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let started = Instant::now();
        let timeout = self.inner.config.lock_timeout();
        let mut guards = Vec::with_capacity(locks.len());

        for (name, lock) in locks {
            let guard = match timeout {
                Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                    .await
                    .map_err(|_| StateError::LockTimeout(name.clone()))?,
                None => lock.lock_owned().await,
            };
            guards.push((name, guard));
        }

        observe::record_lock_wait(started.elapsed());
        Ok(MemTxn::new(guards))
    }
}

/// Builder returned by [`MemDb::table`]
pub struct TableBuilder<Obj, K> {
    db: MemDb,
    name: String,
    indexer: PrimaryIndexer<Obj, K>,
    constraint: Option<Constraint<Obj>>,
}

impl<Obj, K> TableBuilder<Obj, K>
where
    Obj: Clone + Send + Sync + 'static,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Reject inserts for which `check` returns an error
    pub fn constraint(
        mut self,
        check: impl Fn(&Obj) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.constraint = Some(Arc::new(check));
        self
    }

    pub fn create(self) -> Result<MemTable<Obj, K>> {
        let mut locks = self.db.inner.locks.write();
        if locks.contains_key(&self.name) {
            return Err(StateError::TableExists(self.name));
        }
        locks.insert(self.name.clone(), Arc::new(Mutex::new(())));
        drop(locks);

        tracing::debug!("Created table {}", self.name);

        let cell = TableCell::new(
            self.name,
            self.indexer,
            self.constraint,
            self.db.inner.config.tracker_durability,
        );
        Ok(MemTable::from_cell(Arc::new(cell)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemill_core::{DeleteTracker, RwTable, Table, TrackerDurability, WriteTxn};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Device {
        id: u32,
        name: String,
    }

    fn device(id: u32, name: &str) -> Device {
        Device {
            id,
            name: name.to_string(),
        }
    }

    fn devices(db: &MemDb) -> MemTable<Device, u32> {
        db.table("devices", PrimaryIndexer::new("id", |d: &Device| d.id))
            .create()
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes() {
        let db = MemDb::default();
        let table = devices(&db);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        table.insert(&mut txn, device(1, "eth0")).unwrap();
        table.insert(&mut txn, device(2, "eth1")).unwrap();
        assert_eq!(table.revision(&txn), 2);
        assert!(table.is_empty());

        let info = txn.commit().unwrap();
        assert_eq!(info.tables_written, 1);
        assert_eq!(info.objects_written, 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.committed_revision(), 2);
        assert_eq!(table.get(&1), Some(device(1, "eth0")));
    }

    #[tokio::test]
    async fn test_abort_and_drop_discard() {
        let db = MemDb::default();
        let table = devices(&db);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        table.insert(&mut txn, device(1, "eth0")).unwrap();
        txn.abort();
        assert!(table.is_empty());

        {
            let mut txn = db.write_txn(&["devices"]).await.unwrap();
            table.insert(&mut txn, device(1, "eth0")).unwrap();
        }
        assert!(table.is_empty());
        assert_eq!(table.committed_revision(), 0);
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let db = MemDb::default();
        devices(&db);

        let err = db.write_txn(&["devices", "routes"]).await.unwrap_err();
        assert!(matches!(err, StateError::TableUnavailable(name) if name == "routes"));
    }

    #[tokio::test]
    async fn test_duplicate_table() {
        let db = MemDb::default();
        devices(&db);
        let err = db
            .table("devices", PrimaryIndexer::new("id", |d: &Device| d.id))
            .create()
            .unwrap_err();
        assert!(matches!(err, StateError::TableExists(_)));
    }

    #[tokio::test]
    async fn test_write_requires_lock() {
        let db = MemDb::default();
        let table = devices(&db);
        let other: MemTable<Device, u32> = db
            .table("other", PrimaryIndexer::new("id", |d: &Device| d.id))
            .create()
            .unwrap();

        let mut txn = db.write_txn(&["other"]).await.unwrap();
        let err = table.insert(&mut txn, device(1, "eth0")).unwrap_err();
        assert!(matches!(err, StateError::TableNotLocked(_)));
        assert!(other.insert(&mut txn, device(1, "eth0")).is_ok());
    }

    #[tokio::test]
    async fn test_debug_names_locked_tables() {
        let db = MemDb::default();
        let table = devices(&db);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let tracker = table.delete_tracker(&mut txn, "audit").unwrap();

        let txn_debug = format!("{txn:?}");
        assert!(txn_debug.contains("MemTxn"));
        assert!(txn_debug.contains("\"devices\""));

        let tracker_debug = format!("{tracker:?}");
        assert!(tracker_debug.contains("\"audit\""));
        assert!(tracker_debug.contains("closed: false"));
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let db = MemDb::new(MemDbConfig::new().with_lock_timeout_ms(20));
        devices(&db);

        let _held = db.write_txn(&["devices"]).await.unwrap();
        let err = db.write_txn(&["devices"]).await.unwrap_err();
        assert!(matches!(err, StateError::LockTimeout(_)));
    }

    #[tokio::test]
    async fn test_lock_released_on_commit() {
        let db = MemDb::default();
        let table = devices(&db);

        let txn = db.write_txn(&["devices"]).await.unwrap();
        let waiter = {
            let db = db.clone();
            let table = table.clone();
            tokio::spawn(async move {
                let mut txn = db.write_txn(&["devices"]).await.unwrap();
                table.insert(&mut txn, device(9, "lo")).unwrap();
                txn.commit().unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        txn.commit().unwrap();

        tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(table.get(&9), Some(device(9, "lo")));
    }

    #[tokio::test]
    async fn test_constraint_rejects_insert() {
        let db = MemDb::default();
        let table = db
            .table("devices", PrimaryIndexer::new("id", |d: &Device| d.id))
            .constraint(|d: &Device| {
                if d.name.is_empty() {
                    Err("name must not be empty".into())
                } else {
                    Ok(())
                }
            })
            .create()
            .unwrap();

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let err = table.insert(&mut txn, device(1, "")).unwrap_err();
        assert!(matches!(err, StateError::Constraint { .. }));
        assert!(table.insert(&mut txn, device(1, "eth0")).is_ok());
    }

    #[tokio::test]
    async fn test_watch_fires_on_commit() {
        let db = MemDb::default();
        let table = devices(&db);
        let watch = table.watch(0);
        assert!(!watch.is_ready());

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        table.insert(&mut txn, device(1, "eth0")).unwrap();
        txn.commit().unwrap();

        let rev = tokio::time::timeout(Duration::from_millis(500), watch.ready())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rev, 1);
    }

    #[tokio::test]
    async fn test_tracker_delivers_tombstone_once() {
        let db = MemDb::default();
        let table = devices(&db);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let mut tracker = table.delete_tracker(&mut txn, "t").unwrap();
        table.insert(&mut txn, device(1, "eth0")).unwrap();
        table.insert(&mut txn, device(2, "eth1")).unwrap();
        txn.commit().unwrap();

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        table.delete(&mut txn, &device(1, "eth0")).unwrap();
        txn.commit().unwrap();
        assert_eq!(table.graveyard_len(), 1);

        let mut seen = Vec::new();
        let mut txn = db.write_txn(&[]).await.unwrap();
        let processed = tracker
            .process(&mut txn, 0, |_, change| {
                seen.push((change.object.id, change.deleted, change.revision));
                Ok(())
            })
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(seen, vec![(2, false, 2), (1, true, 3)]);
        assert_eq!(processed.revision, 3);
        assert_eq!(table.tracker_cursor("t"), Some(3));

        let mut txn = db.write_txn(&[]).await.unwrap();
        let again = tracker
            .process(&mut txn, processed.revision, |_, _| {
                panic!("nothing new to deliver")
            })
            .unwrap();
        assert_eq!(again.processed, 0);
        txn.commit().unwrap();

        // next write prunes the acknowledged tombstone
        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        table.insert(&mut txn, device(3, "eth2")).unwrap();
        txn.commit().unwrap();
        assert_eq!(table.graveyard_len(), 0);
    }

    #[tokio::test]
    async fn test_no_tombstones_without_trackers() {
        let db = MemDb::default();
        let table = devices(&db);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        table.insert(&mut txn, device(1, "eth0")).unwrap();
        table.delete(&mut txn, &device(1, "eth0")).unwrap();
        txn.commit().unwrap();
        assert_eq!(table.graveyard_len(), 0);
        assert_eq!(table.committed_revision(), 2);
    }

    #[tokio::test]
    async fn test_process_error_keeps_progress() {
        let db = MemDb::default();
        let table = devices(&db);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let mut tracker = table.delete_tracker(&mut txn, "t").unwrap();
        for id in 1..=3 {
            table.insert(&mut txn, device(id, "x")).unwrap();
        }
        txn.commit().unwrap();

        let mut txn = db.write_txn(&[]).await.unwrap();
        let err = tracker
            .process(&mut txn, 0, |_, change| {
                if change.object.id == 3 {
                    Err(StateError::constraint("derived", "transform failed"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert_eq!(err.revision, 2);
        assert_eq!(err.processed, 2);

        // aborting the consumer's transaction discards the cursor move
        txn.abort();
        assert_eq!(table.tracker_cursor("t"), Some(0));
    }

    #[tokio::test]
    async fn test_tracker_registration_lifecycle() {
        let db = MemDb::default();
        let table = devices(&db);

        // aborted registration frees the name
        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let tracker = table.delete_tracker(&mut txn, "t").unwrap();
        txn.abort();
        drop(tracker);
        assert_eq!(table.tracker_cursor("t"), None);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let mut tracker = table.delete_tracker(&mut txn, "t").unwrap();
        let err = table.delete_tracker(&mut txn, "t").unwrap_err();
        assert!(matches!(err, StateError::TrackerExists { .. }));
        txn.commit().unwrap();

        tracker.close();
        tracker.close();
        assert!(tracker.is_closed());
        assert_eq!(table.tracker_cursor("t"), None);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        assert!(table.delete_tracker(&mut txn, "t").is_ok());
    }

    #[tokio::test]
    async fn test_durable_tracker_resumes() {
        let db = MemDb::new(MemDbConfig::new().with_tracker_durability(TrackerDurability::Durable));
        let table = devices(&db);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let mut tracker = table.delete_tracker(&mut txn, "t").unwrap();
        assert_eq!(tracker.start_revision(), 0);
        table.insert(&mut txn, device(1, "eth0")).unwrap();
        txn.commit().unwrap();

        let mut txn = db.write_txn(&[]).await.unwrap();
        tracker.process(&mut txn, 0, |_, _| Ok(())).unwrap();
        txn.commit().unwrap();
        drop(tracker);

        // deletes while released are retained for the resumed tracker
        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        table.delete(&mut txn, &device(1, "eth0")).unwrap();
        txn.commit().unwrap();
        assert_eq!(table.graveyard_len(), 1);

        let mut txn = db.write_txn(&["devices"]).await.unwrap();
        let tracker = table.delete_tracker(&mut txn, "t").unwrap();
        txn.commit().unwrap();
        assert_eq!(tracker.start_revision(), 1);
    }
}
