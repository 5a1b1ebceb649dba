//! Application configuration.
//!
//! Settings are read from `site_explorer.toml` when one exists and then overridden by
//! environment variables. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file searched in the default locations.
pub const CONFIG_FILE_NAME: &str = "site_explorer.toml";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {variable}: '{value}'")]
    InvalidEnv { variable: &'static str, value: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body limit, mainly for document uploads.
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

/// Remote backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    /// Transport timeout. Unset means requests are never cut short.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Action controller timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_panel_revert_ms")]
    pub panel_revert_ms: u64,
    #[serde(default = "default_flash_revert_ms")]
    pub flash_revert_ms: u64,
    #[serde(default = "default_maps_base_url")]
    pub maps_base_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit_mb() -> usize {
    50
}

fn default_gateway_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_panel_revert_ms() -> u64 {
    2000
}

fn default_flash_revert_ms() -> u64 {
    3000
}

fn default_maps_base_url() -> String {
    "https://www.google.com/maps".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            timeout_secs: None,
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            panel_revert_ms: default_panel_revert_ms(),
            flash_revert_ms: default_flash_revert_ms(),
            maps_base_url: default_maps_base_url(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from the first `site_explorer.toml` found in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    ///
    /// Returns `Ok(None)` when there is no file.
    pub fn from_default_location() -> Result<Option<Self>, ConfigError> {
        let search_paths = [
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("backend").join(CONFIG_FILE_NAME),
            PathBuf::from("..").join(CONFIG_FILE_NAME),
        ];

        for path in search_paths {
            if path.exists() {
                tracing::info!(path = %path.display(), "loading configuration");
                return Self::from_file(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// File (or defaults) plus process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_default_location()?.unwrap_or_default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override settings from `HOST`, `PORT`, `GATEWAY_URL` and `GATEWAY_TIMEOUT_SECS`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|v| !v.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                variable: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(url) = lookup("GATEWAY_URL").filter(|v| !v.is_empty()) {
            self.gateway.base_url = url;
        }
        if let Some(timeout) = lookup("GATEWAY_TIMEOUT_SECS").filter(|v| !v.is_empty()) {
            let secs = timeout.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                variable: "GATEWAY_TIMEOUT_SECS",
                value: timeout.clone(),
            })?;
            self.gateway.timeout_secs = Some(secs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.server.body_limit_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.gateway.timeout_secs, None);
        assert_eq!(config.actions.panel_revert_ms, 2000);
        assert_eq!(config.actions.flash_revert_ms, 3000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
[gateway]
base_url = "http://backend:5000"

[actions]
flash_revert_ms = 1500
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.base_url, "http://backend:5000");
        assert_eq!(config.actions.flash_revert_ms, 1500);
        assert_eq!(config.actions.panel_revert_ms, 2000);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9000\nbody_limit_mb = 10").unwrap();
        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.body_limit_mb, 10);
    }

    #[test]
    fn test_body_limit_saturates() {
        let mut config = AppConfig::default();
        config.server.body_limit_mb = usize::MAX / 2;
        assert_eq!(config.server.body_limit_bytes(), usize::MAX);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a port\"").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "3000"),
            ("GATEWAY_URL", "http://gee:5000"),
            ("GATEWAY_TIMEOUT_SECS", "120"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.gateway.base_url, "http://gee:5000");
        assert_eq!(config.gateway.timeout_secs, Some(120));
    }

    #[test]
    fn test_invalid_port_env() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|name| (name == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for PORT: 'eighty'");
    }
}
