use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::RetryPolicy;

/// Environment variable that overrides `api.base_url`.
const API_URL_ENV: &str = "CONSCHED_API_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Instance shown when none is given on the command line
  pub default_instance: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  /// Whether the con publishes announcements
  #[serde(default = "default_true")]
  pub announcements: bool,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Disable to never read or write the local cache
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default)]
  pub backend: CacheBackend,
  /// Cache database location (default: $XDG_DATA_HOME/consched/cache.db)
  pub path: Option<PathBuf>,
  /// Size limit of the memory backend in bytes
  pub quota_bytes: Option<usize>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      backend: CacheBackend::default(),
      path: None,
      quota_bytes: None,
    }
  }
}

/// Where cached records live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// SQLite file, survives restarts
  #[default]
  Sqlite,
  /// Process memory only
  Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
  #[serde(default = "default_base_delay_ms")]
  pub base_delay_ms: u64,
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      base_delay_ms: default_base_delay_ms(),
      max_attempts: default_max_attempts(),
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      base_delay: Duration::from_millis(self.base_delay_ms),
      max_attempts: self.max_attempts,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

fn default_true() -> bool {
  true
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_base_delay_ms() -> u64 {
  1500
}

fn default_max_attempts() -> u32 {
  5
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./consched.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/consched/config.yaml
  ///
  /// `CONSCHED_API_URL` overrides the configured API base URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/consched/config.yaml\n\
                 See config.example.yaml for the format."
        ))
      }
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      config.api.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("consched.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("consched").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config: Config = serde_yaml::from_str("api:\n  base_url: https://api.example.org\n").unwrap();

    assert_eq!(config.api.timeout_secs, 30);
    assert!(config.cache.enabled);
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    assert!(config.cache.path.is_none());
    assert!(config.announcements);
    assert_eq!(config.default_instance, None);

    let policy = config.retry.policy();
    assert_eq!(policy.base_delay, Duration::from_millis(1500));
    assert_eq!(policy.max_attempts, 5);
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: https://api.example.org/v1
  timeout_secs: 10
default_instance: testcon-2026
cache:
  enabled: false
  path: /tmp/consched.db
retry:
  base_delay_ms: 500
  max_attempts: 3
announcements: false
log:
  file: /tmp/consched.log
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(config.default_instance.as_deref(), Some("testcon-2026"));
    assert!(!config.cache.enabled);
    assert_eq!(config.retry.policy().max_attempts, 3);
    assert!(!config.announcements);
    assert_eq!(config.log.file, Some(PathBuf::from("/tmp/consched.log")));
  }

  #[test]
  fn test_memory_backend_with_quota() {
    let yaml = r#"
api:
  base_url: https://api.example.org
cache:
  backend: memory
  quota_bytes: 65536
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();

    assert!(config.cache.enabled);
    assert_eq!(config.cache.backend, CacheBackend::Memory);
    assert_eq!(config.cache.quota_bytes, Some(65536));
  }

  #[test]
  fn test_load_missing_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(Some(&dir.path().join("nope.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_load_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consched.yaml");
    std::fs::write(&path, "api:\n  base_url: http://localhost:8080\n").unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.api.base_url, "http://localhost:8080");
  }
}
