use statemill_core::Revision;
use tokio::sync::watch;

/// Observer of a derivation's cursor
///
/// The cursor is the input revision up to which every change has been
/// applied to the output and committed.
#[derive(Debug, Clone)]
pub struct DeriveProgress {
    rx: watch::Receiver<Revision>,
}

impl DeriveProgress {
    pub(crate) fn new(rx: watch::Receiver<Revision>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> Revision {
        *self.rx.borrow()
    }

    /// Wait until the cursor reaches `revision`
    ///
    /// Returns the cursor observed, or `None` if the derivation stopped
    /// before getting there.
    pub async fn wait_for(&self, revision: Revision) -> Option<Revision> {
        let mut rx = self.rx.clone();
        let reached = rx.wait_for(|cursor| *cursor >= revision).await;
        reached.ok().map(|cursor| *cursor)
    }
}
