//! Event catalog and bus

mod bus;
mod catalog;

pub use bus::{EventBus, DEFAULT_MAX_LISTENERS};
pub use catalog::{Event, EventName, PlayerEvent};
