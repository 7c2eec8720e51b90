pub mod change;
pub mod commit;

pub use change::{Change, Revision};
pub use commit::CommitInfo;
