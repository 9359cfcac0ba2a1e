//! Configuration Management Module
//!
//! Settings for both remote stores and the HTTP API, loaded from an optional
//! TOML or JSON file and overridden by `FLOWLENS_*` environment variables.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::provenance::PollPolicy;
use crate::transport::Credential;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "FLOWLENS_";

/// Configuration file format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    Json,
    #[default]
    Toml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            _ => Err(anyhow!("Unsupported config format: {}", s)),
        }
    }
}

impl ConfigFormat {
    /// Detect format from a file extension, defaulting to TOML
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ext.parse(),
            None => Ok(ConfigFormat::Toml),
        }
    }
}

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the NiFi REST API
    pub nifi_api_url: String,
    pub nifi_username: Option<String>,
    pub nifi_password: Option<String>,
    /// Bearer token; takes precedence over username/password
    pub nifi_token: Option<String>,

    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,

    pub api_host: String,
    pub api_port: u16,
    pub cors_origins: Vec<String>,
    pub log_level: String,

    pub grafana_url: String,
    pub grafana_api_key: Option<String>,
    pub grafana_username: Option<String>,
    pub grafana_password: Option<String>,
    pub loki_datasource_uid: Option<String>,
    pub loki_direct_url: Option<String>,
    pub loki_service_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nifi_api_url: "https://localhost:8443/nifi-api/".to_string(),
            nifi_username: None,
            nifi_password: None,
            nifi_token: None,
            request_timeout_secs: 30,
            poll_interval_ms: 1000,
            poll_max_attempts: 120,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            log_level: "info".to_string(),
            grafana_url: "http://localhost:3000".to_string(),
            grafana_api_key: None,
            grafana_username: None,
            grafana_password: None,
            loki_datasource_uid: None,
            loki_direct_url: None,
            loki_service_name: "nifi-local-instance".to_string(),
        }
    }
}

impl Settings {
    /// Load settings: file (if given and present), then env overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                info!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file; format is taken from the extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let settings = match format {
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?,
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse JSON config: {}", e))?,
        };

        info!("Loaded configuration from {:?}", path);
        Ok(settings)
    }

    /// Write settings to `path` in the format implied by its extension
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| anyhow!("Failed to serialize TOML config: {}", e))?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| anyhow!("Failed to serialize JSON config: {}", e))?,
        };

        fs::write(path, content)
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// `lookup` receives full variable names (`FLOWLENS_NIFI_API_URL`, ...).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(url) = var("NIFI_API_URL") {
            self.nifi_api_url = url;
            debug!("Applied env override for NiFi API URL");
        }
        if let Some(username) = var("NIFI_USERNAME") {
            self.nifi_username = Some(username);
        }
        if let Some(password) = var("NIFI_PASSWORD") {
            self.nifi_password = Some(password);
        }
        if let Some(token) = var("NIFI_TOKEN") {
            self.nifi_token = Some(token);
            debug!("Applied env override for NiFi token");
        }
        if let Some(timeout) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(interval) = var("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_number("POLL_INTERVAL_MS", &interval)?;
        }
        if let Some(attempts) = var("POLL_MAX_ATTEMPTS") {
            self.poll_max_attempts = parse_number("POLL_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(host) = var("API_HOST") {
            self.api_host = host;
        }
        if let Some(port) = var("API_PORT") {
            self.api_port = parse_number("API_PORT", &port)?;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = var("GRAFANA_URL") {
            self.grafana_url = url;
        }
        if let Some(key) = var("GRAFANA_API_KEY") {
            self.grafana_api_key = Some(key);
        }
        if let Some(username) = var("GRAFANA_USERNAME") {
            self.grafana_username = Some(username);
        }
        if let Some(password) = var("GRAFANA_PASSWORD") {
            self.grafana_password = Some(password);
        }
        if let Some(uid) = var("LOKI_DATASOURCE_UID") {
            self.loki_datasource_uid = Some(uid);
        }
        if let Some(url) = var("LOKI_DIRECT_URL") {
            self.loki_direct_url = Some(url);
        }
        if let Some(service) = var("LOKI_SERVICE_NAME") {
            self.loki_service_name = service;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.nifi_api_url.trim().is_empty() {
            return Err(anyhow!("nifi_api_url must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("Request timeout must be greater than 0"));
        }
        if self.poll_max_attempts == 0 {
            return Err(anyhow!("poll_max_attempts must be at least 1"));
        }
        if self.nifi_username.is_some() != self.nifi_password.is_some() {
            return Err(anyhow!(
                "nifi_username and nifi_password must be configured together"
            ));
        }
        Ok(())
    }

    /// Credential for the NiFi API
    pub fn nifi_credential(&self) -> Credential {
        if let Some(ref token) = self.nifi_token {
            return Credential::Bearer(token.clone());
        }
        match (&self.nifi_username, &self.nifi_password) {
            (Some(username), Some(password)) => Credential::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Credential::Anonymous,
        }
    }

    /// Credential for Grafana; the API key is preferred over basic auth
    pub fn grafana_credential(&self) -> Credential {
        if let Some(ref key) = self.grafana_api_key {
            return Credential::Bearer(key.clone());
        }
        match (&self.grafana_username, &self.grafana_password) {
            (Some(username), Some(password)) => Credential::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Credential::Anonymous,
        }
    }

    /// Poll policy derived from the configured interval and attempt ceiling
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.poll_max_attempts,
        }
    }

    /// Default config file location: `<config_dir>/flowlens/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flowlens").join("config.toml"))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| anyhow!("Invalid value for {}{}: {:?}", ENV_PREFIX, name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.poll_interval_ms, 1000);
        assert_eq!(settings.poll_max_attempts, 120);
        assert_eq!(settings.api_port, 8000);
        assert_eq!(settings.nifi_credential(), Credential::Anonymous);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_config_format_from_str() {
        assert_eq!("json".parse::<ConfigFormat>().unwrap(), ConfigFormat::Json);
        assert_eq!("TOML".parse::<ConfigFormat>().unwrap(), ConfigFormat::Toml);
        assert!("yaml".parse::<ConfigFormat>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env_overrides(env(&[
                ("FLOWLENS_NIFI_API_URL", "http://nifi:8080/nifi-api"),
                ("FLOWLENS_POLL_MAX_ATTEMPTS", "10"),
                ("FLOWLENS_CORS_ORIGINS", "http://a, http://b,"),
            ]))
            .unwrap();

        assert_eq!(settings.nifi_api_url, "http://nifi:8080/nifi-api");
        assert_eq!(settings.poll_max_attempts, 10);
        assert_eq!(settings.cors_origins, vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_env_override_rejects_garbage_numbers() {
        let mut settings = Settings::default();
        let result = settings.apply_env_overrides(env(&[("FLOWLENS_API_PORT", "eighty")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_credential_precedence() {
        let mut settings = Settings {
            nifi_username: Some("admin".into()),
            nifi_password: Some("secret".into()),
            ..Settings::default()
        };
        assert!(matches!(settings.nifi_credential(), Credential::Basic { .. }));

        settings.nifi_token = Some("tok".into());
        assert_eq!(settings.nifi_credential(), Credential::Bearer("tok".into()));
    }

    #[test]
    fn test_validation_rejects_half_basic_auth() {
        let settings = Settings {
            nifi_username: Some("admin".into()),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            poll_max_attempts: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_config_save_load_toml_and_json() {
        let temp_dir = tempdir().unwrap();

        for name in ["flowlens.toml", "flowlens.json"] {
            let path = temp_dir.path().join(name);
            let settings = Settings {
                nifi_api_url: "http://nifi:9090/nifi-api/".into(),
                poll_max_attempts: 7,
                ..Settings::default()
            };
            settings.save(&path).unwrap();

            let loaded = Settings::from_file(&path).unwrap();
            assert_eq!(loaded, settings);
        }
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("partial.toml");
        fs::write(&path, "api_port = 9000\n").unwrap();

        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded.api_port, 9000);
        assert_eq!(loaded.poll_max_attempts, 120);
    }

    #[test]
    fn test_poll_policy_from_settings() {
        let settings = Settings {
            poll_interval_ms: 250,
            poll_max_attempts: 4,
            ..Settings::default()
        };
        let policy = settings.poll_policy();
        assert_eq!(policy.interval, Duration::from_millis(250));
        assert_eq!(policy.max_attempts, 4);
    }
}
