//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Datelike;
use serde::Deserialize;

use seasonscan_engine::{Backend, Period};

pub const PASSWORD_ENV: &str = "SEASONSCAN_PASSWORD";
pub const USERNAME_ENV: &str = "SEASONSCAN_USERNAME";

/// Global configuration for seasonscan
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub portal: PortalSection,
    pub scan: ScanSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalSection {
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout: u64,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub password: Option<String>,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            base_url: seasonscan_portal::DEFAULT_BASE_URL.to_string(),
            timeout: 30,
            username: std::env::var(USERNAME_ENV).ok(),
            password: std::env::var(PASSWORD_ENV).ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub prefix: String,
    pub start_period: Period,
    /// Last season to look at; the calendar year when unset
    pub current_period: Option<Period>,
    pub batch_size: usize,
    pub concurrency: usize,
    pub delay_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backend: Backend,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            prefix: "V".to_string(),
            start_period: 2018,
            current_period: None,
            batch_size: 100,
            concurrency: 6,
            delay_ms: 400,
            max_retries: 2,
            retry_delay_ms: 1000,
            backend: Backend::default(),
        }
    }
}

impl ScanSection {
    pub fn current_period(&self) -> Period {
        self.current_period
            .unwrap_or_else(|| chrono::Local::now().year().max(0) as Period)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub data_dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./seasonscan.toml (current directory)
    /// 2. ~/.config/seasonscan/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("seasonscan.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "seasonscan") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn portal(&self) -> seasonscan_portal::PortalConfig {
        seasonscan_portal::PortalConfig {
            base_url: self.portal.base_url.clone(),
            timeout: Duration::from_secs(self.portal.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.store.data_dir, PathBuf::from("./data"));
        assert_eq!(config.scan.prefix, "V");
        assert_eq!(config.scan.start_period, 2018);
        assert_eq!(config.scan.batch_size, 100);
        assert_eq!(config.scan.backend, Backend::Cooperative);
        assert!(config.scan.current_period() >= 2024);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("SEASONSCAN_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${SEASONSCAN_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("SEASONSCAN_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[portal]
base_url = "http://localhost:8080/booking/"
timeout = 5
username = "clerk"

[scan]
current_period = 2024
concurrency = 3
backend = "thread-pool"

[store]
data_dir = "/tmp/growers"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.portal.base_url, "http://localhost:8080/booking/");
        assert_eq!(config.portal().timeout, Duration::from_secs(5));
        assert_eq!(config.portal.username.as_deref(), Some("clerk"));
        assert_eq!(config.scan.current_period(), 2024);
        assert_eq!(config.scan.concurrency, 3);
        assert_eq!(config.scan.backend, Backend::ThreadPool);
        // untouched keys keep their defaults
        assert_eq!(config.scan.delay(), Duration::from_millis(400));
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/growers"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let toml = "[scan]\nbackend = \"fibers\"\n";
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
