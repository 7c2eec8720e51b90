pub mod derive;
pub mod store;

pub use derive::DeriveConfig;
pub use store::{MemDbConfig, TrackerDurability};
