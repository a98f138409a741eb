//! Supervisor configuration.

use std::collections::BTreeMap;

use serde::Deserialize;
use wos_kernel::KernelConfig;

/// Configuration accepted by `new Supervisor(json)`.
///
/// Kernel fields sit at the top level next to the supervisor's own:
///
/// ```json
/// { "loader_url": "/loader.js", "programs": { "webdav": "..." }, "mounts": [] }
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    #[serde(flatten)]
    pub kernel: KernelConfig,
    /// Script that bootstraps a worker for a non-URL process path
    pub loader_url: String,
    /// Sources served as `internal:<name>` program entries
    pub programs: BTreeMap<String, String>,
    /// Maximum `log` level written to the browser console
    pub log_level: String,
}

impl SupervisorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::default(),
            loader_url: String::from("/loader.js"),
            programs: BTreeMap::new(),
            log_level: String::from("info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::from_json("{}").unwrap();
        assert_eq!(config, SupervisorConfig::default());
        assert_eq!(config.kernel.mounts.len(), 2);
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn test_flattened_kernel_fields() {
        let config = SupervisorConfig::from_json(
            r#"{"mounts": [], "loader_url": "/boot.js", "programs": {"webdav": "x"}, "log_level": "debug"}"#,
        )
        .unwrap();
        assert!(config.kernel.mounts.is_empty());
        assert_eq!(config.kernel.assigns.len(), 1);
        assert_eq!(config.loader_url, "/boot.js");
        assert_eq!(config.programs.get("webdav").map(String::as_str), Some("x"));
        assert_eq!(config.log_level(), log::LevelFilter::Debug);
    }
}
