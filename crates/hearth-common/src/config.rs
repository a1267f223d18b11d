use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = ".hearth/config.toml";
const DEFAULT_DB_FILE: &str = "hearth.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HearthConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    pub token: Option<String>,
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_menu_ttl_secs")]
    pub menu_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub endpoint: Option<String>,
    pub api_key_env: Option<String>,
    #[serde(default = "default_decoder_timeout_ms")]
    pub timeout_ms: u64,
}

/// How a target hint that matches several records is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Take the first match in collection order.
    #[default]
    First,
    /// Ask the user to narrow the hint down.
    Clarify,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub ambiguous_match: MatchPolicy,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            allowlist: Vec::new(),
            poll_timeout_secs: default_poll_timeout_secs(),
            menu_ttl_secs: default_menu_ttl_secs(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: None,
            timeout_ms: default_decoder_timeout_ms(),
        }
    }
}

impl Default for HearthConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hearth")
            .join("data");

        Self {
            data_dir,
            log_level: "info".to_string(),
            currency_symbol: default_currency_symbol(),
            store: StoreConfig::default(),
            telegram: TelegramConfig::default(),
            web: WebConfig::default(),
            decoder: DecoderConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_menu_ttl_secs() -> u64 {
    60
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_decoder_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("config has invalid value: {0}")]
    ValidationFailed(String),
}

impl HearthConfig {
    pub fn resolve_path() -> PathBuf {
        if let Ok(path) = env::var("HEARTH_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, raw).map_err(|source| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn load_or_create() -> Result<(Self, PathBuf, bool), ConfigError> {
        let path = Self::resolve_path();
        if path.exists() {
            let cfg = Self::load(&path)?;
            return Ok((cfg, path, false));
        }

        let cfg = Self::default();
        cfg.save(&path)?;
        Ok((cfg, path, true))
    }

    /// Sqlite file location: explicit `store.db_path`, else `<data_dir>/hearth.db`.
    pub fn db_path(&self) -> PathBuf {
        self.store
            .db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_DB_FILE))
    }

    pub fn validate_and_prepare(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "log_level cannot be empty".to_string(),
            ));
        }
        if self.currency_symbol.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "currency_symbol cannot be empty".to_string(),
            ));
        }
        if self.telegram.menu_ttl_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "telegram.menu_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(endpoint) = &self.decoder.endpoint
            && endpoint.trim().is_empty()
        {
            return Err(ConfigError::ValidationFailed(
                "decoder.endpoint cannot be empty if set".to_string(),
            ));
        }
        fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::WriteFailed {
            path: self.data_dir.clone(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_falls_back_to_section_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            format!(
                "data_dir = {:?}\nlog_level = \"debug\"\n[dispatch]\nambiguous_match = \"clarify\"\n",
                tmp.path().join("data")
            ),
        )
        .expect("write config");

        let cfg = HearthConfig::load(&path).expect("load");
        assert_eq!(cfg.currency_symbol, "₹");
        assert_eq!(cfg.telegram.menu_ttl_secs, 60);
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.dispatch.ambiguous_match, MatchPolicy::Clarify);
        assert_eq!(cfg.db_path(), tmp.path().join("data").join("hearth.db"));
    }

    #[test]
    fn save_then_load_keeps_values() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("nested").join("config.toml");
        let mut cfg = HearthConfig {
            data_dir: tmp.path().join("data"),
            ..HearthConfig::default()
        };
        cfg.currency_symbol = "$".to_string();
        cfg.store.backend = StoreBackend::Memory;
        cfg.save(&path).expect("save");

        let loaded = HearthConfig::load(&path).expect("load");
        assert_eq!(loaded.currency_symbol, "$");
        assert_eq!(loaded.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn validation_rejects_zero_menu_ttl() {
        let tmp = tempdir().expect("tempdir");
        let mut cfg = HearthConfig {
            data_dir: tmp.path().join("data"),
            ..HearthConfig::default()
        };
        cfg.telegram.menu_ttl_secs = 0;
        let err = cfg.validate_and_prepare().expect_err("must fail");
        assert!(err.to_string().contains("menu_ttl_secs"));
    }

    #[test]
    fn validation_creates_data_dir() {
        let tmp = tempdir().expect("tempdir");
        let cfg = HearthConfig {
            data_dir: tmp.path().join("a").join("b"),
            ..HearthConfig::default()
        };
        cfg.validate_and_prepare().expect("valid");
        assert!(cfg.data_dir.is_dir());
    }
}
