//! Extension contract and optional capabilities

use super::context::PluginContext;
use super::info::PluginInfo;
use crate::state::StateChange;
use crate::types::{LiveInfo, PlayerErrorInfo, QualityLevel};
use async_trait::async_trait;

/// Contract every extension implements.
///
/// Methods take `&self`; plugins keep mutable state behind `Cell`/`RefCell`.
/// Optional capabilities are reached through the `as_*` accessors, which
/// return `None` unless the plugin overrides them.
#[async_trait(?Send)]
pub trait Plugin: 'static {
    /// Identity, version, category and dependencies
    fn info(&self) -> PluginInfo;

    /// Called once dependencies are ready. `config` is the registration-time
    /// configuration, if any.
    async fn init(&self, ctx: PluginContext, config: Option<&serde_json::Value>) -> anyhow::Result<()>;

    /// Called at teardown. Failures are logged and the plugin is still reset.
    async fn destroy(&self) -> anyhow::Result<()>;

    /// Any state store field changed while this plugin is ready
    fn on_state_change(&self, _change: &StateChange) -> anyhow::Result<()> {
        Ok(())
    }

    /// An error event was published while this plugin is ready
    fn on_error(&self, _error: &PlayerErrorInfo) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
        None
    }

    fn as_quality_control(&self) -> Option<&dyn QualityControl> {
        None
    }

    fn as_live_source(&self) -> Option<&dyn LiveSource> {
        None
    }
}

/// Loads sources of the kinds it recognizes
#[async_trait(?Send)]
pub trait SourceProvider {
    fn can_play(&self, source: &str) -> bool;

    async fn load_source(&self, source: &str) -> anyhow::Result<()>;
}

/// Exposes a quality ladder
pub trait QualityControl {
    fn levels(&self) -> Vec<QualityLevel>;

    /// Pin a level, or `None` for automatic selection
    fn set_level(&self, index: Option<usize>) -> anyhow::Result<()>;

    /// `None` while automatic selection is active
    fn current_level(&self) -> Option<usize>;
}

/// Reports live-stream metadata
pub trait LiveSource {
    fn live_info(&self) -> Option<LiveInfo>;
}
