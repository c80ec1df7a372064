//! Reactive primitives
//!
//! - [`Signal`]: a single observable value
//! - [`Computed`]: a lazily recomputed, cached derivation
//! - [`effect`]: a callback re-run whenever a cell it read changes
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Dependency capture is
//! implicit: reading a cell while a derivation or effect runs subscribes it,
//! through the stack-scoped context in [`tracking`].

mod computed;
mod effect;
mod same_value;
mod signal;
pub mod tracking;

pub use computed::Computed;
pub use effect::{effect, Effect};
pub use same_value::SameValue;
pub use signal::{Signal, WeakSignal};
pub use tracking::untracked;
