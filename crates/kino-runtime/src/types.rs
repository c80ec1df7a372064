//! Core types for Kino Runtime

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback status as observed through the state store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// No source loaded
    #[default]
    Idle,
    /// A provider is loading the source
    Loading,
    /// Source loaded, not started
    Ready,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// Waiting for data
    Buffering,
    /// Playback reached the end
    Ended,
    /// A fatal error occurred
    Error,
}

impl PlaybackStatus {
    /// Whether a source is loaded and controllable
    pub fn has_source(&self) -> bool {
        !matches!(self, PlaybackStatus::Idle | PlaybackStatus::Loading | PlaybackStatus::Error)
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Loading => write!(f, "loading"),
            PlaybackStatus::Ready => write!(f, "ready"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Buffering => write!(f, "buffering"),
            PlaybackStatus::Ended => write!(f, "ended"),
            PlaybackStatus::Error => write!(f, "error"),
        }
    }
}

/// One entry of a provider's quality ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityLevel {
    /// Position in the provider's ladder
    pub index: usize,
    /// Bandwidth in bits per second
    pub bitrate: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Human-readable label ("720p")
    pub label: String,
}

impl QualityLevel {
    pub fn new(index: usize, bitrate: u64, height: Option<u32>) -> Self {
        let label = match height {
            Some(h) => format!("{}p", h),
            None => format!("{}kbps", bitrate / 1000),
        };
        Self {
            index,
            bitrate,
            width: height.map(|h| h * 16 / 9),
            height,
            label,
        }
    }
}

/// Live stream metadata reported by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveInfo {
    /// Whether the stream is live
    pub is_live: bool,
    /// Distance behind the live edge, in seconds
    pub latency: f64,
    /// Seekable window length, in seconds (0 when not seekable)
    pub dvr_window: f64,
    /// Whether playback is at the live edge
    pub at_live_edge: bool,
}

/// Classification of errors surfaced to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No provider accepts the source
    NoProvider,
    /// The provider failed to load the source
    LoadFailed,
    /// A plugin failed to initialize
    PluginInit,
    /// Media could not be decoded
    Decode,
    /// Network failure reported by a provider
    Network,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::NoProvider => write!(f, "NO_PROVIDER"),
            ErrorCode::LoadFailed => write!(f, "LOAD_FAILED"),
            ErrorCode::PluginInit => write!(f, "PLUGIN_INIT"),
            ErrorCode::Decode => write!(f, "DECODE"),
            ErrorCode::Network => write!(f, "NETWORK"),
            ErrorCode::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Error record delivered through the error event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    /// Fatal errors end the current playback
    pub fatal: bool,
    /// Plugin that reported or caused the error
    pub plugin: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PlayerErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>, fatal: bool) -> Self {
        Self {
            code,
            message: message.into(),
            fatal,
            plugin: None,
            timestamp: Utc::now(),
        }
    }

    pub fn fatal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message, true)
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }
}
