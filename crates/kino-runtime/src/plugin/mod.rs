//! Plugin system
//!
//! Plugins implement [`Plugin`] and are driven by the [`PluginRegistry`]
//! through `registered -> initializing -> ready`, in dependency order. Each
//! one talks to the player only through its [`PluginContext`].

mod context;
mod graph;
mod info;
mod lifecycle;
mod registry;
mod traits;

pub use context::{PluginContext, PluginLogger};
pub use graph::{resolve_order, DependencyCycle};
pub use info::{PluginCategory, PluginDependency, PluginInfo};
pub use lifecycle::{LifecycleState, PluginDescriptor, RegistryStats};
pub use registry::PluginRegistry;
pub use traits::{LiveSource, Plugin, QualityControl, SourceProvider};
