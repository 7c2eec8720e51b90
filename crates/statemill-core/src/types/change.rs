use serde::{Deserialize, Serialize};

/// Table revision - strictly monotonic per table, 0 means "no writes yet"
pub type Revision = u64;

/// A single change observed on a table
///
/// Live objects carry `deleted == false`. Tombstones carry the last
/// version of the removed object (so its primary key is preserved) and
/// `deleted == true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<Obj> {
    pub object: Obj,
    pub deleted: bool,
    pub revision: Revision,
}

impl<Obj> Change<Obj> {
    pub fn live(object: Obj, revision: Revision) -> Self {
        Self {
            object,
            deleted: false,
            revision,
        }
    }

    pub fn tombstone(object: Obj, revision: Revision) -> Self {
        Self {
            object,
            deleted: true,
            revision,
        }
    }
}
