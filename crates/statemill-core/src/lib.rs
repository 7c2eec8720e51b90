//! Statemill Core: types and traits for reactive derived tables
//!
//! This crate defines the abstractions shared by the table store, the job
//! runtime and the derivation engine:
//! - Table store: exclusive write transactions over keyed, revisioned tables
//! - Delete trackers: named, revision-cursored change subscriptions that
//!   include tombstones for removed objects
//! - Watch: readiness signal for "a change after revision R exists"
//!
//! Key properties:
//! - Every write to a table is stamped with the next table revision
//! - Changes are delivered in ascending revision order
//! - A batch of writes becomes visible atomically on commit

pub mod config;
pub mod error;
pub mod observe;
pub mod traits;
pub mod types;
pub mod watch;

pub use config::{DeriveConfig, MemDbConfig, TrackerDurability};
pub use error::{Result, StateError};
pub use traits::{
    DeleteTracker, PrimaryIndexer, ProcessError, Processed, Query, RwTable, StateStore, Table,
    TrackerGuard, WriteTxn,
};
pub use types::{Change, CommitInfo, Revision};
pub use watch::Watch;
