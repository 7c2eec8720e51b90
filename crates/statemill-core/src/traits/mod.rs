pub mod store;
pub mod table;
pub mod tracker;

pub use store::{StateStore, WriteTxn};
pub use table::{PrimaryIndexer, Query, RwTable, Table};
pub use tracker::{DeleteTracker, ProcessError, Processed, TrackerGuard};
