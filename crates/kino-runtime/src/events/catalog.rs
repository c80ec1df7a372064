//! Player event catalog
//!
//! The mapping from event name to payload shape is the contract between the
//! host application and every plugin. New names are additive; renaming an
//! event or changing a payload is a breaking change.

use crate::state::StateChange;
use crate::types::{LiveInfo, PlayerErrorInfo, QualityLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// An event type the bus can route by name
pub trait Event: Clone + 'static {
    type Name: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static;

    fn name(&self) -> Self::Name;
}

/// Events published by the player and its plugins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    // Lifecycle
    Ready,
    Play,
    Pause,
    Playing,
    Waiting,
    Ended,
    Destroy,

    // Loading
    LoadStart {
        source: String,
    },
    Loaded {
        source: String,
        provider: String,
    },

    // Playback
    TimeUpdate {
        current_time: f64,
        duration: f64,
    },
    Seeking {
        from: f64,
        to: f64,
    },
    Seeked {
        position: f64,
    },
    VolumeChange {
        volume: f64,
        muted: bool,
    },
    RateChange {
        rate: f64,
    },

    // Quality and live metadata
    LevelsLoaded {
        levels: Vec<QualityLevel>,
    },
    QualityChange {
        level: Option<usize>,
        auto: bool,
    },
    LiveUpdate {
        info: LiveInfo,
    },

    /// Errors, fatal or not
    Error(PlayerErrorInfo),

    /// Any state store field changed
    StateChange(StateChange),

    // Plugin lifecycle
    PluginRegistered {
        id: String,
    },
    PluginReady {
        id: String,
    },
    PluginError {
        id: String,
        message: String,
    },
    PluginDestroyed {
        id: String,
    },
    PluginUnregistered {
        id: String,
    },

    /// Plugin-defined event
    Custom {
        name: String,
        data: serde_json::Value,
    },
}

impl PlayerEvent {
    pub fn custom(name: impl Into<String>, data: serde_json::Value) -> Self {
        PlayerEvent::Custom {
            name: name.into(),
            data,
        }
    }
}

impl Event for PlayerEvent {
    type Name = EventName;

    fn name(&self) -> EventName {
        match self {
            PlayerEvent::Ready => EventName::Ready,
            PlayerEvent::Play => EventName::Play,
            PlayerEvent::Pause => EventName::Pause,
            PlayerEvent::Playing => EventName::Playing,
            PlayerEvent::Waiting => EventName::Waiting,
            PlayerEvent::Ended => EventName::Ended,
            PlayerEvent::Destroy => EventName::Destroy,
            PlayerEvent::LoadStart { .. } => EventName::LoadStart,
            PlayerEvent::Loaded { .. } => EventName::Loaded,
            PlayerEvent::TimeUpdate { .. } => EventName::TimeUpdate,
            PlayerEvent::Seeking { .. } => EventName::Seeking,
            PlayerEvent::Seeked { .. } => EventName::Seeked,
            PlayerEvent::VolumeChange { .. } => EventName::VolumeChange,
            PlayerEvent::RateChange { .. } => EventName::RateChange,
            PlayerEvent::LevelsLoaded { .. } => EventName::LevelsLoaded,
            PlayerEvent::QualityChange { .. } => EventName::QualityChange,
            PlayerEvent::LiveUpdate { .. } => EventName::LiveUpdate,
            PlayerEvent::Error(_) => EventName::Error,
            PlayerEvent::StateChange(_) => EventName::StateChange,
            PlayerEvent::PluginRegistered { .. } => EventName::PluginRegistered,
            PlayerEvent::PluginReady { .. } => EventName::PluginReady,
            PlayerEvent::PluginError { .. } => EventName::PluginError,
            PlayerEvent::PluginDestroyed { .. } => EventName::PluginDestroyed,
            PlayerEvent::PluginUnregistered { .. } => EventName::PluginUnregistered,
            PlayerEvent::Custom { name, .. } => EventName::Custom(name.clone()),
        }
    }
}

/// Routing key for [`PlayerEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    Ready,
    Play,
    Pause,
    Playing,
    Waiting,
    Ended,
    Destroy,
    LoadStart,
    Loaded,
    TimeUpdate,
    Seeking,
    Seeked,
    VolumeChange,
    RateChange,
    LevelsLoaded,
    QualityChange,
    LiveUpdate,
    Error,
    StateChange,
    PluginRegistered,
    PluginReady,
    PluginError,
    PluginDestroyed,
    PluginUnregistered,
    Custom(String),
}

impl EventName {
    /// Every built-in event name, in catalog order
    pub const BUILTIN: [EventName; 24] = [
        EventName::Ready,
        EventName::Play,
        EventName::Pause,
        EventName::Playing,
        EventName::Waiting,
        EventName::Ended,
        EventName::Destroy,
        EventName::LoadStart,
        EventName::Loaded,
        EventName::TimeUpdate,
        EventName::Seeking,
        EventName::Seeked,
        EventName::VolumeChange,
        EventName::RateChange,
        EventName::LevelsLoaded,
        EventName::QualityChange,
        EventName::LiveUpdate,
        EventName::Error,
        EventName::StateChange,
        EventName::PluginRegistered,
        EventName::PluginReady,
        EventName::PluginError,
        EventName::PluginDestroyed,
        EventName::PluginUnregistered,
    ];

    pub fn custom(name: impl Into<String>) -> Self {
        EventName::Custom(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventName::Ready => "ready",
            EventName::Play => "play",
            EventName::Pause => "pause",
            EventName::Playing => "playing",
            EventName::Waiting => "waiting",
            EventName::Ended => "ended",
            EventName::Destroy => "destroy",
            EventName::LoadStart => "load_start",
            EventName::Loaded => "loaded",
            EventName::TimeUpdate => "time_update",
            EventName::Seeking => "seeking",
            EventName::Seeked => "seeked",
            EventName::VolumeChange => "volume_change",
            EventName::RateChange => "rate_change",
            EventName::LevelsLoaded => "levels_loaded",
            EventName::QualityChange => "quality_change",
            EventName::LiveUpdate => "live_update",
            EventName::Error => "error",
            EventName::StateChange => "state_change",
            EventName::PluginRegistered => "plugin_registered",
            EventName::PluginReady => "plugin_ready",
            EventName::PluginError => "plugin_error",
            EventName::PluginDestroyed => "plugin_destroyed",
            EventName::PluginUnregistered => "plugin_unregistered",
            EventName::Custom(name) => name,
        }
    }

    /// Whether the event carries no payload
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventName::Ready
                | EventName::Play
                | EventName::Pause
                | EventName::Playing
                | EventName::Waiting
                | EventName::Ended
                | EventName::Destroy
        )
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = std::convert::Infallible;

    /// Built-in names parse to their variant; anything else is a custom event
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventName::BUILTIN
            .iter()
            .find(|name| name.as_str() == s)
            .cloned()
            .unwrap_or_else(|| EventName::Custom(s.to_string())))
    }
}

impl From<&str> for EventName {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(name) => name,
            Err(never) => match never {},
        }
    }
}
