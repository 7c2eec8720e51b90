//! In-memory table store with delete tracking
//!
//! Implements the statemill store traits on top of copy-on-write table
//! states:
//! - Write transactions lock whole tables, in name order, with an optional
//!   acquisition timeout
//! - Writes are staged on a private copy and published atomically on commit
//! - Deleted objects leave tombstones while any delete tracker is registered;
//!   tombstones every tracker has moved past are pruned on the next write
//! - Tracker cursors advance only when the consumer's transaction commits

pub mod state;
pub mod store;
pub mod table;
pub mod tracker;
pub mod txn;

pub use state::TableState;
pub use store::{MemDb, TableBuilder};
pub use table::{Constraint, MemTable};
pub use tracker::MemDeleteTracker;
pub use txn::MemTxn;
