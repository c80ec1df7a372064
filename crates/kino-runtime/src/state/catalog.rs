//! The fixed catalog of observable player fields

use crate::reactive::SameValue;
use crate::types::{PlaybackStatus, PlayerErrorInfo, QualityLevel};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Name of a field in the state store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    /// Currently loaded source
    Source,
    /// Playback status
    Status,
    /// Playback position in seconds
    CurrentTime,
    /// Content duration in seconds (0 while unknown)
    Duration,
    /// Seconds buffered ahead of the playhead
    Buffered,
    /// Volume in `[0, 1]`
    Volume,
    Muted,
    PlaybackRate,
    Autoplay,
    IsLive,
    /// Quality ladder of the active provider
    QualityLevels,
    /// Selected quality index (null while automatic)
    CurrentQuality,
    AutoQuality,
    Fullscreen,
    PictureInPicture,
    Casting,
    /// Last fatal error
    Error,
}

/// Shape of the values a key accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    Text,
    Status,
    Index,
    Levels,
    Error,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Number => write!(f, "number"),
            ValueKind::Text => write!(f, "text"),
            ValueKind::Status => write!(f, "status"),
            ValueKind::Index => write!(f, "index"),
            ValueKind::Levels => write!(f, "quality levels"),
            ValueKind::Error => write!(f, "error"),
        }
    }
}

impl StateKey {
    /// Every key, in catalog order
    pub const ALL: [StateKey; 17] = [
        StateKey::Source,
        StateKey::Status,
        StateKey::CurrentTime,
        StateKey::Duration,
        StateKey::Buffered,
        StateKey::Volume,
        StateKey::Muted,
        StateKey::PlaybackRate,
        StateKey::Autoplay,
        StateKey::IsLive,
        StateKey::QualityLevels,
        StateKey::CurrentQuality,
        StateKey::AutoQuality,
        StateKey::Fullscreen,
        StateKey::PictureInPicture,
        StateKey::Casting,
        StateKey::Error,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StateKey::Source => "source",
            StateKey::Status => "status",
            StateKey::CurrentTime => "current_time",
            StateKey::Duration => "duration",
            StateKey::Buffered => "buffered",
            StateKey::Volume => "volume",
            StateKey::Muted => "muted",
            StateKey::PlaybackRate => "playback_rate",
            StateKey::Autoplay => "autoplay",
            StateKey::IsLive => "is_live",
            StateKey::QualityLevels => "quality_levels",
            StateKey::CurrentQuality => "current_quality",
            StateKey::AutoQuality => "auto_quality",
            StateKey::Fullscreen => "fullscreen",
            StateKey::PictureInPicture => "picture_in_picture",
            StateKey::Casting => "casting",
            StateKey::Error => "error",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            StateKey::Source => ValueKind::Text,
            StateKey::Status => ValueKind::Status,
            StateKey::CurrentTime
            | StateKey::Duration
            | StateKey::Buffered
            | StateKey::Volume
            | StateKey::PlaybackRate => ValueKind::Number,
            StateKey::Muted
            | StateKey::Autoplay
            | StateKey::IsLive
            | StateKey::AutoQuality
            | StateKey::Fullscreen
            | StateKey::PictureInPicture
            | StateKey::Casting => ValueKind::Bool,
            StateKey::QualityLevels => ValueKind::Levels,
            StateKey::CurrentQuality => ValueKind::Index,
            StateKey::Error => ValueKind::Error,
        }
    }

    /// Whether the key accepts [`StateValue::Null`]
    pub fn nullable(&self) -> bool {
        matches!(self, StateKey::Source | StateKey::CurrentQuality | StateKey::Error)
    }

    /// Documented default value
    pub fn default_value(&self) -> StateValue {
        match self {
            StateKey::Source | StateKey::CurrentQuality | StateKey::Error => StateValue::Null,
            StateKey::Status => StateValue::Status(PlaybackStatus::Idle),
            StateKey::CurrentTime | StateKey::Duration | StateKey::Buffered => StateValue::Number(0.0),
            StateKey::Volume | StateKey::PlaybackRate => StateValue::Number(1.0),
            StateKey::AutoQuality => StateValue::Bool(true),
            StateKey::Muted
            | StateKey::Autoplay
            | StateKey::IsLive
            | StateKey::Fullscreen
            | StateKey::PictureInPicture
            | StateKey::Casting => StateValue::Bool(false),
            StateKey::QualityLevels => StateValue::Levels(Vec::new()),
        }
    }

    /// Check that `value` fits this key
    pub fn validate(&self, value: &StateValue) -> Result<()> {
        match value.kind() {
            None if self.nullable() => Ok(()),
            Some(kind) if kind == self.kind() => Ok(()),
            found => Err(Error::StateTypeMismatch {
                key: self.name().to_string(),
                expected: self.kind().to_string(),
                found: found.map_or_else(|| "null".to_string(), |k| k.to_string()),
            }),
        }
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StateKey::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| Error::UnknownStateKey(s.to_string()))
    }
}

/// Value held by a state field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Null,
    Bool(bool),
    Number(f64),
    Index(usize),
    Text(String),
    Status(PlaybackStatus),
    Levels(Vec<QualityLevel>),
    Error(PlayerErrorInfo),
}

impl StateValue {
    /// Kind of the value; `None` for null
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            StateValue::Null => None,
            StateValue::Bool(_) => Some(ValueKind::Bool),
            StateValue::Number(_) => Some(ValueKind::Number),
            StateValue::Index(_) => Some(ValueKind::Index),
            StateValue::Text(_) => Some(ValueKind::Text),
            StateValue::Status(_) => Some(ValueKind::Status),
            StateValue::Levels(_) => Some(ValueKind::Levels),
            StateValue::Error(_) => Some(ValueKind::Error),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            StateValue::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<PlaybackStatus> {
        match self {
            StateValue::Status(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_levels(&self) -> Option<&[QualityLevel]> {
        match self {
            StateValue::Levels(levels) => Some(levels),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&PlayerErrorInfo> {
        match self {
            StateValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Decode untyped JSON as the kind of value `key` holds.
    ///
    /// The JSON form alone is ambiguous (a status is a string, an index is a
    /// number), so the key decides which variant to build.
    pub fn from_json(key: StateKey, json: serde_json::Value) -> Result<Self> {
        let found = match &json {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "text",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        };
        let decoded = match (key.kind(), json) {
            (_, serde_json::Value::Null) => Some(StateValue::Null),
            (ValueKind::Bool, json) => json.as_bool().map(StateValue::Bool),
            (ValueKind::Number, json) => json.as_f64().map(StateValue::Number),
            (ValueKind::Index, json) => json
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(StateValue::Index),
            (ValueKind::Text, serde_json::Value::String(s)) => Some(StateValue::Text(s)),
            (ValueKind::Text, _) => None,
            (ValueKind::Status, json) => serde_json::from_value(json).ok().map(StateValue::Status),
            (ValueKind::Levels, json) => serde_json::from_value(json).ok().map(StateValue::Levels),
            (ValueKind::Error, json) => serde_json::from_value(json).ok().map(StateValue::Error),
        };
        let value = decoded.ok_or_else(|| Error::StateTypeMismatch {
            key: key.name().to_string(),
            expected: key.kind().to_string(),
            found: found.to_string(),
        })?;
        key.validate(&value)?;
        Ok(value)
    }
}

impl SameValue for StateValue {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (StateValue::Number(a), StateValue::Number(b)) => a.same_value(b),
            _ => self == other,
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Bool(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        StateValue::Number(v)
    }
}

impl From<usize> for StateValue {
    fn from(v: usize) -> Self {
        StateValue::Index(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::Text(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::Text(v)
    }
}

impl From<PlaybackStatus> for StateValue {
    fn from(v: PlaybackStatus) -> Self {
        StateValue::Status(v)
    }
}

impl From<Vec<QualityLevel>> for StateValue {
    fn from(v: Vec<QualityLevel>) -> Self {
        StateValue::Levels(v)
    }
}

impl From<PlayerErrorInfo> for StateValue {
    fn from(v: PlayerErrorInfo) -> Self {
        StateValue::Error(v)
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(StateValue::Null, Into::into)
    }
}
