//! Kernel boot configuration.
//!
//! Every field has a default, so an empty JSON object boots the standard
//! wiring:
//!
//! ```json
//! {
//!   "mounts": [
//!     { "volume": "http",  "path": "internal:webdav", "argv": ["with-host"] },
//!     { "volume": "https", "path": "internal:webdav", "argv": ["with-host", "secure"] }
//!   ],
//!   "assigns": [{ "source": "con:", "dest": "internal:console" }],
//!   "max_assign_rounds": 32,
//!   "id_length": 7
//! }
//! ```

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KernelError;

/// Length of generated pids and channel ids
pub const DEFAULT_ID_LENGTH: usize = 7;

/// A process-backed volume mounted at boot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    pub volume: String,
    /// Code path of the backing process
    pub path: String,
    #[serde(default)]
    pub argv: Vec<Value>,
}

/// An assign installed at boot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignConfig {
    pub source: String,
    pub dest: String,
}

/// Kernel configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Process-backed mounts, in mount order
    pub mounts: Vec<MountConfig>,
    /// Assigns, in resolution order
    pub assigns: Vec<AssignConfig>,
    /// Cap on assign substitution rounds per resolution
    pub max_assign_rounds: usize,
    /// Length of generated identifiers
    pub id_length: usize,
}

impl KernelConfig {
    /// Configuration with no mounts or assigns beyond `internal:`.
    pub fn bare() -> Self {
        Self {
            mounts: Vec::new(),
            assigns: Vec::new(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        serde_json::from_str(json).map_err(|e| KernelError::Config(e.to_string()))
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mounts: vec![
                MountConfig {
                    volume: String::from("http"),
                    path: String::from("internal:webdav"),
                    argv: vec![Value::from("with-host")],
                },
                MountConfig {
                    volume: String::from("https"),
                    path: String::from("internal:webdav"),
                    argv: vec![Value::from("with-host"), Value::from("secure")],
                },
            ],
            assigns: vec![AssignConfig {
                source: String::from("con:"),
                dest: String::from("internal:console"),
            }],
            max_assign_rounds: wos_vfs::DEFAULT_MAX_ROUNDS,
            id_length: DEFAULT_ID_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(KernelConfig::from_json("{}").unwrap(), KernelConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = KernelConfig::from_json(r#"{"mounts": [], "id_length": 4}"#).unwrap();
        assert!(config.mounts.is_empty());
        assert_eq!(config.id_length, 4);
        assert_eq!(config.assigns.len(), 1);
        assert_eq!(config.max_assign_rounds, 32);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            KernelConfig::from_json("{\"mounts\": 3}"),
            Err(KernelError::Config(_))
        ));
    }
}
