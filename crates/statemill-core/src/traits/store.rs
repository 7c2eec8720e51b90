use crate::error::Result;
use crate::types::CommitInfo;
use async_trait::async_trait;

/// Exclusive write transaction over one or more tables
///
/// All writes become visible atomically on commit. Dropping a transaction
/// that was neither committed nor aborted aborts it.
pub trait WriteTxn: Send {
    /// Publish every staged write and release the table locks
    fn commit(self) -> Result<CommitInfo>;

    /// Discard every staged write and release the table locks
    fn abort(self);
}

/// Transactional table store
///
/// Provides:
/// - Exclusive, all-or-nothing write transactions over named tables
/// - Lock acquisition in a global order, so writers touching several
///   tables cannot deadlock each other
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    type Txn: WriteTxn + 'static;

    /// Begin a write transaction locking every table in `tables`
    ///
    /// Waits while another writer holds any of the locks. Fails with
    /// `TableUnavailable` if a table does not exist.
    async fn write_txn(&self, tables: &[&str]) -> Result<Self::Txn>;
}
