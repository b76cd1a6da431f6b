use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Startup configuration. Read once; never reloaded.
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    /// Path of the XML file to watch.
    pub xml_path: PathBuf,
    /// What to extract from it.
    #[serde(default)]
    pub xml_config: XmlTarget,
    /// Fallback poll period in milliseconds. 0 disables polling.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay before the watch is re-registered after a change.
    #[serde(default = "default_rearm_delay_ms")]
    pub rearm_delay_ms: u64,
}

/// The node to extract from the document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct XmlTarget {
    /// Expected name of the document root. Only checked, never required.
    pub root_node: String,
    /// Human-readable node name used in the "not found" message.
    pub target_node: String,
    /// ElementTree-style path evaluated against the root element.
    pub xpath: String,
}

impl Default for XmlTarget {
    fn default() -> Self {
        Self {
            root_node: "root".to_string(),
            target_node: "DatabaseName".to_string(),
            xpath: ".//DatabaseName".to_string(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_rearm_delay_ms() -> u64 {
    100
}

impl OverlayConfig {
    /// Load configuration from `path`.
    ///
    /// Files with a `.toml` extension are parsed as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&contents).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }

    pub fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms)
    }
}
