// EASE Bridge - Scripting Engine Bridge
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Configuration system for the bridge
//!
//! Values come from, in increasing priority: built-in defaults, the user
//! config file (`<config dir>/ease-bridge/config.toml`) or an explicit file,
//! and finally command line flags applied by the binary.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

/// Substring identifying frames that belong to the bridge itself.
pub const DEFAULT_BRIDGE_MARKER: &str = "ease_bridge";

/// Host package roots bound into every fresh namespace.
pub const DEFAULT_NAMESPACE_ROOTS: &[&str] = &["java", "javax", "org", "com", "net", "jvm"];

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Names bound to host package roots at session start
    pub namespace_roots: Vec<String>,
    /// Connection to the host process
    pub host: HostConfig,
    /// Own JSON-RPC server
    pub server: ServerConfig,
    /// Trace relay settings
    pub trace: TraceConfig,
    /// Shutdown behaviour
    pub shutdown: ShutdownConfig,
}

/// Host connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Address the host listens on
    pub address: String,
    /// Timeout of a single host call in seconds
    pub request_timeout_secs: u64,
}

/// Settings of the bridge's own server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on, 0 picks an ephemeral port
    pub listen_port: u16,
    /// Capacity of the request queue in front of the executor
    pub queue_capacity: usize,
}

/// Trace relay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Install the trace relay at session start
    pub enabled: bool,
    /// Substring marking bridge frames (matched case-insensitively)
    pub bridge_marker: String,
    /// Frames walked at most when filtering one event
    pub max_frame_depth: usize,
}

/// Shutdown settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Seconds granted to graceful shutdown before a forced exit
    pub deadline_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            server: ServerConfig::default(),
            trace: TraceConfig::default(),
            shutdown: ShutdownConfig::default(),
            namespace_roots: DEFAULT_NAMESPACE_ROOTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { address: "127.0.0.1".to_string(), request_timeout_secs: 30 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen_port: 0, queue_capacity: 1024 }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { enabled: false, bridge_marker: DEFAULT_BRIDGE_MARKER.to_string(), max_frame_depth: 4096 }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { deadline_secs: 10 }
    }
}

impl BridgeConfig {
    /// Path of the per-user configuration file, if a config directory exists
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ease-bridge").join("config.toml"))
    }

    /// Load the configuration
    ///
    /// An explicit path must exist and parse. Without one, the per-user file is
    /// used when present and the defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Serialize to pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")
    }

    /// URL of the host's JSON-RPC endpoint
    pub fn host_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host.address, port)
    }

    /// Host request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.host.request_timeout_secs)
    }

    /// Deadline of the forced-exit timer
    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown.deadline_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.shutdown_deadline(), Duration::from_secs(10));
        assert_eq!(config.trace.bridge_marker, "ease_bridge");
        assert!(!config.trace.enabled);
        assert_eq!(config.server.listen_port, 0);
        assert_eq!(config.namespace_roots, vec!["java", "javax", "org", "com", "net", "jvm"]);
        assert_eq!(config.host_url(25333), "http://127.0.0.1:25333");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[trace]\nenabled = true\n\n[shutdown]\ndeadline_secs = 3").unwrap();

        let config = BridgeConfig::load(Some(file.path())).unwrap();
        assert!(config.trace.enabled);
        assert_eq!(config.trace.bridge_marker, DEFAULT_BRIDGE_MARKER);
        assert_eq!(config.shutdown.deadline_secs, 3);
        assert_eq!(config.host.request_timeout_secs, 30);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_toml_output_parses_back() {
        let mut config = BridgeConfig::default();
        config.namespace_roots = vec!["java".into()];
        let text = config.to_toml().unwrap();
        let parsed: BridgeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
