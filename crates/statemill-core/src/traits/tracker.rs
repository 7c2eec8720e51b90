use crate::error::{Result, StateError};
use crate::types::{Change, Revision};
use crate::watch::Watch;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// Outcome of a fully processed batch of changes
#[derive(Debug)]
pub struct Processed {
    /// Every change up to and including this revision has been delivered
    pub revision: Revision,

    /// Number of change events delivered
    pub processed: usize,

    /// Ready once a change after `revision` exists
    pub watch: Watch,
}

/// A batch stopped at a failing change event
///
/// `revision` is the last revision that was delivered successfully, so
/// progress made before the failure is not lost.
#[derive(Debug, Error)]
#[error("change processing stopped after revision {revision} ({processed} events delivered): {source}")]
pub struct ProcessError {
    pub revision: Revision,
    pub processed: usize,
    #[source]
    pub source: StateError,
}

impl ProcessError {
    pub fn into_source(self) -> StateError {
        self.source
    }
}

/// Named, revision-cursored subscription to a table's changes, including
/// tombstones for removed objects
///
/// A tombstone for a key is delivered at most once per registration and only
/// after the live versions of that key that preceded the deletion.
pub trait DeleteTracker: Send {
    type Object;
    type Txn;

    fn name(&self) -> &str;

    /// Revision a consumer starting with this tracker should process after
    fn start_revision(&self) -> Revision;

    /// Deliver every change with revision > `from` in ascending revision
    /// order, stopping at the first callback error.
    ///
    /// Runs inside `txn`, a write transaction on the consumer's output; the
    /// callback receives it back so it can write. The tracker's own progress
    /// is recorded as part of `txn` and is discarded if `txn` aborts.
    fn process<F>(
        &mut self,
        txn: &mut Self::Txn,
        from: Revision,
        on_change: F,
    ) -> std::result::Result<Processed, ProcessError>
    where
        F: FnMut(&mut Self::Txn, Change<Self::Object>) -> Result<()>;

    /// Release the tracker's bookkeeping. Idempotent.
    fn close(&mut self);
}

/// Owns a tracker and closes it when dropped
pub struct TrackerGuard<T: DeleteTracker> {
    tracker: T,
}

impl<T: DeleteTracker> TrackerGuard<T> {
    pub fn new(tracker: T) -> Self {
        Self { tracker }
    }
}

impl<T: DeleteTracker> Deref for TrackerGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.tracker
    }
}

impl<T: DeleteTracker> DerefMut for TrackerGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.tracker
    }
}

impl<T: DeleteTracker> Drop for TrackerGuard<T> {
    fn drop(&mut self) {
        self.tracker.close();
    }
}
