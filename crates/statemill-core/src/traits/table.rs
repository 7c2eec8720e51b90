use crate::error::Result;
use crate::traits::store::WriteTxn;
use crate::traits::tracker::DeleteTracker;
use crate::types::Revision;
use std::fmt;
use std::sync::Arc;

/// Point lookup against a named index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<K> {
    pub index: &'static str,
    pub key: K,
}

/// Extracts the primary key of a table's objects
pub struct PrimaryIndexer<Obj, K> {
    name: &'static str,
    key_fn: Arc<dyn Fn(&Obj) -> K + Send + Sync>,
}

impl<Obj, K> PrimaryIndexer<Obj, K> {
    pub fn new(name: &'static str, key_fn: impl Fn(&Obj) -> K + Send + Sync + 'static) -> Self {
        Self {
            name,
            key_fn: Arc::new(key_fn),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self, obj: &Obj) -> K {
        (self.key_fn)(obj)
    }

    /// Query matching the primary key of `obj`
    pub fn query_from_object(&self, obj: &Obj) -> Query<K> {
        self.query(self.key(obj))
    }

    pub fn query(&self, key: K) -> Query<K> {
        Query {
            index: self.name,
            key,
        }
    }
}

impl<Obj, K> Clone for PrimaryIndexer<Obj, K> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            key_fn: self.key_fn.clone(),
        }
    }
}

impl<Obj, K> fmt::Debug for PrimaryIndexer<Obj, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryIndexer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Read side of a table: lookups and change tracking
pub trait Table: Send + Sync {
    type Object: Clone + Send + Sync + 'static;
    type Key: Ord + Clone + fmt::Debug + Send + Sync + 'static;
    type Txn: WriteTxn;
    type Tracker: DeleteTracker<Object = Self::Object, Txn = Self::Txn>;

    fn name(&self) -> &str;

    fn primary_indexer(&self) -> &PrimaryIndexer<Self::Object, Self::Key>;

    /// Table revision as seen by `txn`, including its staged writes
    fn revision(&self, txn: &Self::Txn) -> Revision;

    /// First object matching `query`, with the revision it was written at
    fn first(
        &self,
        txn: &Self::Txn,
        query: &Query<Self::Key>,
    ) -> Option<(Self::Object, Revision)>;

    /// Register a named delete tracker on this table
    ///
    /// `txn` must hold this table's write lock: registration mutates tracker
    /// bookkeeping and only takes effect when `txn` commits. Fails with
    /// `TrackerExists` if a tracker with the same name is registered.
    fn delete_tracker(&self, txn: &mut Self::Txn, name: &str) -> Result<Self::Tracker>;
}

/// Write side of a table
pub trait RwTable: Table {
    /// Insert `obj`, replacing any object with the same primary key.
    /// Returns the replaced object.
    fn insert(&self, txn: &mut Self::Txn, obj: Self::Object) -> Result<Option<Self::Object>>;

    /// Remove the object with the primary key of `obj`.
    /// Returns the removed object; removing an absent key is not an error.
    fn delete(&self, txn: &mut Self::Txn, obj: &Self::Object) -> Result<Option<Self::Object>>;
}
