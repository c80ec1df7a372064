//! Observable player state
//!
//! A fixed catalog of named fields ([`StateKey`]), each backed by one reactive
//! cell, with typed values ([`StateValue`]), a global change channel, and
//! immutable snapshots.

mod catalog;
mod snapshot;
mod store;

pub use catalog::{StateKey, StateValue, ValueKind};
pub use snapshot::StateSnapshot;
pub use store::{StateChange, StateStore};
