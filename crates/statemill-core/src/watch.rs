//! Readiness signal for "a change after revision R exists"

use crate::error::{Result, StateError};
use crate::types::Revision;
use std::fmt;
use tokio::sync::watch;

/// Becomes ready once the table's committed revision exceeds `after`.
///
/// Built on a `tokio::sync::watch` channel carrying the table revision, so a
/// change committed before `ready()` is awaited is still observed, and the
/// signal never fires while the revision is at or below `after`.
pub struct Watch {
    table: String,
    after: Revision,
    rx: watch::Receiver<Revision>,
}

impl Watch {
    pub fn new(table: impl Into<String>, rx: watch::Receiver<Revision>, after: Revision) -> Self {
        Self {
            table: table.into(),
            after,
            rx,
        }
    }

    /// Latest committed revision of the table
    pub fn current(&self) -> Revision {
        *self.rx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.current() > self.after
    }

    /// Wait until a change after `after` is committed; returns the table
    /// revision observed. Fails if the table is dropped first.
    pub async fn ready(mut self) -> Result<Revision> {
        let after = self.after;
        let observed = self.rx.wait_for(|rev| *rev > after).await.map(|rev| *rev);
        observed.map_err(|_| StateError::TableUnavailable(self.table))
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("table", &self.table)
            .field("after", &self.after)
            .field("current", &self.current())
            .finish()
    }
}
