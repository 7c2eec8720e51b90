//! Statemill Derive: incremental table derivation
//!
//! A derivation keeps an output table in sync with an input table through a
//! transform. It registers a named delete tracker on the input, then loops:
//!
//! 1. open a write transaction on the output
//! 2. feed every input change after the cursor, tombstones included, to the
//!    transform and apply the resulting [`DeriveResult`]
//! 3. commit, advance the cursor, and wait for the input to change again
//!
//! The first batch starts from the tracker's start revision and therefore
//! sees every live input object. A failing change ends the run with its
//! error; changes applied before it are committed unless
//! [`DeriveConfig::commit_on_error`](statemill_core::DeriveConfig) is off.
//!
//! Derivations run as jobs of the `statemill-job` runtime: use
//! [`Derive::register`] or the [`derive`] registrar to install one into a
//! [`Lifecycle`](statemill_job::Lifecycle).

pub mod derive;
pub mod progress;

pub use derive::{derive, Derive, DeriveParams, DeriveResult};
pub use progress::DeriveProgress;
