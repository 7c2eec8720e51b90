use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Table unavailable: {0}")]
    TableUnavailable(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Table {0} is not locked by this transaction")]
    TableNotLocked(String),

    #[error("Delete tracker {name:?} is already registered on table {table}")]
    TrackerExists { table: String, name: String },

    #[error("Timed out waiting for write lock on table {0}")]
    LockTimeout(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Constraint violation on table {table}: {reason}")]
    Constraint { table: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;

impl StateError {
    /// Build a constraint violation for `table`.
    pub fn constraint(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Constraint {
            table: table.into(),
            reason: reason.into(),
        }
    }
}

// Transforms and constraints may fail with their own error types. Anything
// implementing `std::error::Error + Send + Sync + 'static` converts into
// `StateError::Other` through anyhow:
//
//     fn check(dev: &Device) -> statemill_core::Result<()> {
//         validate_name(&dev.name).map_err(anyhow::Error::from)?;
//         Ok(())
//     }
