//! Error types for Kino Runtime

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Runtime error types
#[derive(Error, Debug)]
pub enum Error {
    // Plugin registration errors
    #[error("Invalid plugin: {0}")]
    InvalidPlugin(String),

    #[error("Plugin '{id}' is already registered")]
    DuplicatePlugin { id: String },

    #[error("Plugin '{id}' is not registered")]
    PluginNotFound { id: String },

    // Dependency errors
    #[error("Plugin '{plugin}' depends on '{dependency}' which is not registered")]
    MissingDependency { plugin: String, dependency: String },

    #[error("Plugin '{plugin}' requires '{dependency}' {required}, found {found}")]
    IncompatibleDependency {
        plugin: String,
        dependency: String,
        required: semver::VersionReq,
        found: semver::Version,
    },

    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    // Lifecycle errors
    #[error("Plugin '{id}' failed to initialize: {source}")]
    PluginInit {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid lifecycle transition for plugin '{id}': {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    // State errors
    #[error("Unknown state key: {0}")]
    UnknownStateKey(String),

    #[error("State key '{key}' expects {expected}, got {found}")]
    StateTypeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    #[error("State store has been destroyed")]
    StoreDestroyed,

    #[error("Player has been destroyed")]
    PlayerDestroyed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a cycle error from a dependency path
    pub fn cycle(chain: Vec<String>) -> Self {
        Error::CircularDependency { chain }
    }

    /// Returns true for programmer errors that fail synchronously and are never retried
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::InvalidPlugin(_)
                | Error::DuplicatePlugin { .. }
                | Error::PluginNotFound { .. }
                | Error::MissingDependency { .. }
                | Error::IncompatibleDependency { .. }
                | Error::CircularDependency { .. }
                | Error::UnknownStateKey(_)
                | Error::StateTypeMismatch { .. }
                | Error::StoreDestroyed
                | Error::PlayerDestroyed
        )
    }

    /// Returns the error code used in error events and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidPlugin(_) => "INVALID_PLUGIN",
            Error::DuplicatePlugin { .. } => "DUPLICATE_PLUGIN",
            Error::PluginNotFound { .. } => "PLUGIN_NOT_FOUND",
            Error::MissingDependency { .. } => "MISSING_DEPENDENCY",
            Error::IncompatibleDependency { .. } => "INCOMPATIBLE_DEPENDENCY",
            Error::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            Error::PluginInit { .. } => "PLUGIN_INIT",
            Error::InvalidTransition { .. } => "INVALID_TRANSITION",
            Error::UnknownStateKey(_) => "UNKNOWN_STATE_KEY",
            Error::StateTypeMismatch { .. } => "STATE_TYPE_MISMATCH",
            Error::StoreDestroyed => "STORE_DESTROYED",
            Error::PlayerDestroyed => "PLAYER_DESTROYED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_chain() {
        let err = Error::cycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
        assert!(err.is_structural());
        assert_eq!(err.error_code(), "CIRCULAR_DEPENDENCY");
    }

    #[test]
    fn test_plugin_init_is_not_structural() {
        let err = Error::PluginInit {
            id: "hls".into(),
            source: anyhow::anyhow!("boom"),
        };
        assert!(!err.is_structural());
        assert!(err.to_string().contains("boom"));
    }
}
