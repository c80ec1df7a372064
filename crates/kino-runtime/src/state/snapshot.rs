//! Point-in-time copies of the state store

use super::catalog::{StateKey, StateValue};
use crate::types::{PlaybackStatus, PlayerErrorInfo, QualityLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable copy of every field, taken by [`StateStore::snapshot`](super::StateStore::snapshot)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub source: Option<String>,
    pub status: PlaybackStatus,
    pub current_time: f64,
    pub duration: f64,
    pub buffered: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub autoplay: bool,
    pub is_live: bool,
    pub quality_levels: Vec<QualityLevel>,
    pub current_quality: Option<usize>,
    pub auto_quality: bool,
    pub fullscreen: bool,
    pub picture_in_picture: bool,
    pub casting: bool,
    pub error: Option<PlayerErrorInfo>,
}

impl StateSnapshot {
    pub(crate) fn from_values(mut values: HashMap<StateKey, StateValue>) -> Self {
        let mut take = |key: StateKey| values.remove(&key).unwrap_or_else(|| key.default_value());
        let number = |v: StateValue| v.as_f64().unwrap_or_default();
        let flag = |v: StateValue| v.as_bool().unwrap_or_default();

        Self {
            source: take(StateKey::Source).as_str().map(str::to_string),
            status: take(StateKey::Status).as_status().unwrap_or_default(),
            current_time: number(take(StateKey::CurrentTime)),
            duration: number(take(StateKey::Duration)),
            buffered: number(take(StateKey::Buffered)),
            volume: number(take(StateKey::Volume)),
            muted: flag(take(StateKey::Muted)),
            playback_rate: number(take(StateKey::PlaybackRate)),
            autoplay: flag(take(StateKey::Autoplay)),
            is_live: flag(take(StateKey::IsLive)),
            quality_levels: match take(StateKey::QualityLevels) {
                StateValue::Levels(levels) => levels,
                _ => Vec::new(),
            },
            current_quality: take(StateKey::CurrentQuality).as_index(),
            auto_quality: flag(take(StateKey::AutoQuality)),
            fullscreen: flag(take(StateKey::Fullscreen)),
            picture_in_picture: flag(take(StateKey::PictureInPicture)),
            casting: flag(take(StateKey::Casting)),
            error: match take(StateKey::Error) {
                StateValue::Error(e) => Some(e),
                _ => None,
            },
        }
    }

    /// Field value by key
    pub fn get(&self, key: StateKey) -> StateValue {
        match key {
            StateKey::Source => self.source.clone().into(),
            StateKey::Status => self.status.into(),
            StateKey::CurrentTime => self.current_time.into(),
            StateKey::Duration => self.duration.into(),
            StateKey::Buffered => self.buffered.into(),
            StateKey::Volume => self.volume.into(),
            StateKey::Muted => self.muted.into(),
            StateKey::PlaybackRate => self.playback_rate.into(),
            StateKey::Autoplay => self.autoplay.into(),
            StateKey::IsLive => self.is_live.into(),
            StateKey::QualityLevels => self.quality_levels.clone().into(),
            StateKey::CurrentQuality => self.current_quality.into(),
            StateKey::AutoQuality => self.auto_quality.into(),
            StateKey::Fullscreen => self.fullscreen.into(),
            StateKey::PictureInPicture => self.picture_in_picture.into(),
            StateKey::Casting => self.casting.into(),
            StateKey::Error => self.error.clone().into(),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
