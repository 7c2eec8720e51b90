use serde::{Deserialize, Serialize};

/// Information about a committed write transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Number of tables whose contents changed
    pub tables_written: usize,

    /// Number of objects inserted or replaced
    pub objects_written: usize,

    /// Number of objects removed
    pub objects_deleted: usize,
}

impl CommitInfo {
    pub fn is_empty(&self) -> bool {
        self.objects_written == 0 && self.objects_deleted == 0
    }
}
