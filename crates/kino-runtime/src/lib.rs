//! Kino Runtime - Embeddable Media Player Runtime for Kino
//!
//! This crate provides the substrate that player extensions run on:
//! - Reactive cells, derivations and effects
//! - A typed event bus with ordered interceptors
//! - An observable state store with a fixed field catalog
//! - A plugin registry with dependency ordering and lifecycle management
//! - A capability-scoped facade for each plugin
//!
//! Stream providers, player chrome, casting and analytics are plugins; they
//! cooperate through shared state and events without depending on each
//! other.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Kino Runtime                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                      ┌──────────────┐                           │
//! │                      │    Player    │                           │
//! │                      └──────┬───────┘                           │
//! │         ┌───────────────────┼───────────────────┐               │
//! │         │                   │                   │               │
//! │  ┌──────┴───────┐    ┌──────┴───────┐    ┌──────┴───────┐       │
//! │  │    State     │───►│    Event     │◄───│    Plugin    │       │
//! │  │    Store     │    │     Bus      │    │   Registry   │       │
//! │  └──────┬───────┘    └──────────────┘    └──────┬───────┘       │
//! │         │                                       │               │
//! │  ┌──────┴───────┐                        ┌──────┴───────┐       │
//! │  │   Reactive   │                        │    Plugin    │       │
//! │  │  Primitives  │                        │   Context    │       │
//! │  └──────────────┘                        └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread; async plugin hooks are awaited on the
//! caller's executor (a current-thread runtime or `LocalSet` under tokio).

pub mod config;
pub mod error;
pub mod events;
pub mod player;
pub mod plugin;
pub mod reactive;
pub mod source;
pub mod state;
pub mod subscription;
pub mod types;

pub use config::{PlayerConfig, StateOverrides};
pub use error::{Error, Result};
pub use events::{Event, EventBus, EventName, PlayerEvent};
pub use player::Player;
pub use plugin::{
    LifecycleState, LiveSource, Plugin, PluginCategory, PluginContext, PluginDependency, PluginDescriptor,
    PluginInfo, PluginLogger, PluginRegistry, QualityControl, SourceProvider,
};
pub use reactive::{effect, untracked, Computed, Effect, Signal};
pub use state::{StateChange, StateKey, StateSnapshot, StateStore, StateValue};
pub use subscription::Subscription;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the runtime library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Runtime initialized");
}
