//! Plugin metadata

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of extension a plugin is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginCategory {
    /// Loads and controls a kind of source
    Provider,
    /// Player chrome
    Ui,
    /// Optional player feature (casting, captions, shortcuts)
    Feature,
    /// Observes playback for reporting
    Analytics,
    Utility,
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginCategory::Provider => write!(f, "provider"),
            PluginCategory::Ui => write!(f, "ui"),
            PluginCategory::Feature => write!(f, "feature"),
            PluginCategory::Analytics => write!(f, "analytics"),
            PluginCategory::Utility => write!(f, "utility"),
        }
    }
}

/// Plugin identity and dependency list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique registry key
    pub id: String,
    pub name: String,
    pub version: Version,
    pub category: PluginCategory,
    pub description: String,
    /// Plugins that must be ready before this one initializes
    pub dependencies: Vec<PluginDependency>,
}

impl PluginInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: Version, category: PluginCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version,
            category,
            description: String::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependency(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Depend on `id` at any version
    pub fn depends_on(self, id: impl Into<String>) -> Self {
        self.with_dependency(PluginDependency::new(id))
    }

    /// Dependency ids in declaration order
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.id.as_str())
    }
}

/// Reference to another plugin, optionally version-constrained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDependency {
    pub id: String,
    pub version_req: Option<VersionReq>,
}

impl PluginDependency {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version_req: None,
        }
    }

    pub fn with_version(mut self, req: VersionReq) -> Self {
        self.version_req = Some(req);
        self
    }

    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        self.version_req.as_ref().map_or(true, |req| req.matches(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_version_matching() {
        let any = PluginDependency::new("hls");
        assert!(any.is_satisfied_by(&Version::new(0, 1, 0)));

        let pinned = PluginDependency::new("hls").with_version(VersionReq::parse("^1.2").unwrap());
        assert!(pinned.is_satisfied_by(&Version::new(1, 4, 0)));
        assert!(!pinned.is_satisfied_by(&Version::new(2, 0, 0)));
    }

    #[test]
    fn test_info_builder() {
        let info = PluginInfo::new("quality-menu", "Quality Menu", Version::new(1, 0, 0), PluginCategory::Ui)
            .depends_on("hls")
            .depends_on("controls");
        assert_eq!(info.dependency_ids().collect::<Vec<_>>(), vec!["hls", "controls"]);
        assert_eq!(info.category.to_string(), "ui");
    }
}
