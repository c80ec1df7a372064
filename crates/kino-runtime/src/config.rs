//! Player configuration

use crate::error::{Error, Result};
use crate::events::DEFAULT_MAX_LISTENERS;
use crate::state::{StateKey, StateValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Listeners per event before a leak warning (0 = never warn)
    pub max_listeners: usize,
    /// Host mount identifier, exposed read-only to plugins
    pub mount_point: Option<String>,
    /// Initial values replacing the state store defaults
    pub initial_state: StateOverrides,
    /// Configuration per plugin id, used when a plugin is registered without one
    pub plugins: HashMap<String, serde_json::Value>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_listeners: DEFAULT_MAX_LISTENERS,
            mount_point: None,
            initial_state: StateOverrides::default(),
            plugins: HashMap::new(),
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.initial_state.validate()
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }

    pub fn with_plugin_config(mut self, id: impl Into<String>, config: serde_json::Value) -> Self {
        self.plugins.insert(id.into(), config);
        self
    }
}

/// Optional initial values for a subset of state fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateOverrides {
    pub volume: Option<f64>,
    pub muted: Option<bool>,
    pub playback_rate: Option<f64>,
    pub autoplay: Option<bool>,
    pub source: Option<String>,
}

impl StateOverrides {
    pub fn validate(&self) -> Result<()> {
        if let Some(volume) = self.volume {
            if !(0.0..=1.0).contains(&volume) {
                return Err(Error::InvalidConfig(format!("volume must be within [0, 1], got {volume}")));
            }
        }
        if let Some(rate) = self.playback_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(Error::InvalidConfig(format!("playback rate must be positive, got {rate}")));
            }
        }
        Ok(())
    }

    /// Store overrides as typed key/value pairs
    pub fn entries(&self) -> Vec<(StateKey, StateValue)> {
        let mut entries = Vec::new();
        if let Some(volume) = self.volume {
            entries.push((StateKey::Volume, volume.into()));
        }
        if let Some(muted) = self.muted {
            entries.push((StateKey::Muted, muted.into()));
        }
        if let Some(rate) = self.playback_rate {
            entries.push((StateKey::PlaybackRate, rate.into()));
        }
        if let Some(autoplay) = self.autoplay {
            entries.push((StateKey::Autoplay, autoplay.into()));
        }
        if let Some(source) = &self.source {
            entries.push((StateKey::Source, source.as_str().into()));
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.max_listeners, 10);
        assert!(config.initial_state.entries().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PlayerConfig::from_json(
            r##"{
                "mount_point": "#stage",
                "initial_state": { "volume": 0.4, "autoplay": true },
                "plugins": { "analytics": { "endpoint": "https://beacon" } }
            }"##,
        )
        .unwrap();

        assert_eq!(config.max_listeners, 10);
        assert_eq!(config.mount_point.as_deref(), Some("#stage"));
        assert_eq!(config.initial_state.entries().len(), 2);
        assert_eq!(config.plugins["analytics"]["endpoint"], "https://beacon");
    }

    #[test]
    fn test_validation() {
        let err = PlayerConfig::from_json(r#"{ "initial_state": { "volume": 1.5 } }"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let zero_rate = StateOverrides {
            playback_rate: Some(0.0),
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());

        assert!(matches!(PlayerConfig::from_json("{ nope"), Err(Error::Json(_))));
    }
}
