//! Configuration management for casegen
//!
//! Stores settings in ~/.config/casegen/config.json

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_BIND: &str = "127.0.0.1:8001";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const ENV_DATA_DIR: &str = "CASEGEN_DATA_DIR";
const ENV_BIND: &str = "CASEGEN_BIND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the document store keeps its JSON collections
    pub data_dir: Option<PathBuf>,
    /// Address the HTTP API listens on
    pub bind: String,
    /// Transport timeout for a single provider call
    pub request_timeout_secs: u64,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub google_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            bind: DEFAULT_BIND.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            google_base_url: DEFAULT_GOOGLE_BASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("casegen"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk (or defaults), then apply environment overrides
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load from an explicit path. Missing file gives defaults; a corrupt
    /// one is moved aside.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            self.bind = bind;
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let dir = Self::config_dir().context("Could not determine config directory")?;
        let path = dir.join("config.json");
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        write_config_atomic(path, &content).context("Failed to write config")
    }

    /// Check the provider base URLs parse as absolute http(s) URLs
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("openai_base_url", &self.openai_base_url),
            ("anthropic_base_url", &self.anthropic_base_url),
            ("google_base_url", &self.google_base_url),
        ] {
            let parsed =
                Url::parse(value).with_context(|| format!("Invalid {}: {}", name, value))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("Invalid {}: unsupported scheme '{}'", name, parsed.scheme());
            }
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Store directory, falling back to the platform data dir
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("casegen")
        })
    }

    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/casegen/config.json".to_string())
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            tracing::warn!(error = %e, "failed to set temp config file permissions");
        }
    }

    file.write_all(content.as_bytes())?;
    drop(file);

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = AppConfig::default();
        assert!(config.data_dir.is_none());
        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_corrupt_file_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = AppConfig::load_from(&path);

        assert_eq!(config, AppConfig::default());
        assert!(!path.exists());
        assert!(dir.path().join("config.json.corrupt").exists());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            bind: "0.0.0.0:9000".to_string(),
            openai_base_url: "http://localhost:1234/v1".to_string(),
            ..Default::default()
        };

        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"request_timeout_secs": 30}"#).unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.bind, DEFAULT_BIND);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = AppConfig {
            google_base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            anthropic_base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [(ENV_DATA_DIR, "/tmp/casegen-data"), (ENV_BIND, "0.0.0.0:80")].into();
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/casegen-data")));
        assert_eq!(config.bind, "0.0.0.0:80");
        assert_eq!(config.resolved_data_dir(), PathBuf::from("/tmp/casegen-data"));
    }
}
