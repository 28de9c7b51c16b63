//! Deck configuration
//!
//! YAML file (first hit of `--config`, `./config/paneldeck.yaml`,
//! `<config dir>/paneldeck/config.yaml`) with `PANELDECK__SECTION__FIELD`
//! environment overlays applied on top.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use paneldeck_core_types::DeckError;
use paneldeck_durable_cache::{StorageKeys, DEFAULT_SCHEMA_VERSION};
use paneldeck_panel_state::PersistOption;

pub const ENV_PREFIX: &str = "PANELDECK__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for DeckError {
    fn from(value: ConfigError) -> Self {
        DeckError::new(value.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub storage: StorageConfig,
    pub panels: PanelsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Long-lived tier.
    pub primary_dir: PathBuf,
    /// Session-scoped tier used when the primary refuses a write.
    pub fallback_dir: PathBuf,
    pub key_prefix: String,
    pub schema_version: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let primary_dir = dirs::data_local_dir()
            .map(|dir| dir.join("paneldeck").join("local"))
            .unwrap_or_else(|| PathBuf::from(".paneldeck/local"));
        Self {
            primary_dir,
            fallback_dir: env::temp_dir().join("paneldeck").join("session"),
            key_prefix: StorageKeys::DEFAULT_PREFIX.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION,
        }
    }
}

impl StorageConfig {
    pub fn keys(&self) -> StorageKeys {
        StorageKeys::new(self.key_prefix.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelsConfig {
    pub persist: bool,
    pub debounce_ms: Option<u64>,
}

impl Default for PanelsConfig {
    fn default() -> Self {
        Self {
            persist: true,
            debounce_ms: None,
        }
    }
}

impl PanelsConfig {
    pub fn persist_option(&self) -> PersistOption {
        PersistOption {
            enabled: self.persist,
            debounce: self.debounce_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Resolved configuration plus the file it came from, if any.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: DeckConfig,
    pub path: Option<PathBuf>,
}

impl DeckConfig {
    /// Candidate files in lookup order.
    pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit {
            return vec![path.to_path_buf()];
        }
        let mut paths = vec![PathBuf::from("config/paneldeck.yaml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("paneldeck").join("config.yaml"));
        }
        paths
    }

    /// File (or defaults), then process environment overlays, then validation.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        let found = Self::search_paths(explicit)
            .into_iter()
            .find(|path| path.exists());

        let mut config = match &found {
            Some(path) => {
                let config = Self::from_file(path)?;
                info!(path = %path.display(), "loaded configuration");
                config
            }
            None => {
                if let Some(path) = explicit {
                    warn!(path = %path.display(), "config file not found, using defaults");
                }
                DeckConfig::default()
            }
        };

        let applied = config.apply_env_overrides(env::vars())?;
        if applied > 0 {
            info!(count = applied, "applied environment overrides");
        }
        config.validate()?;
        Ok(LoadedConfig {
            config,
            path: found,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Applies every `PANELDECK__SECTION__FIELD=value` pair in `vars` and
    /// returns how many were used.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut tree =
            serde_json::to_value(&*self).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let mut applied = 0;
        for (key, raw) in vars {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let segments: Vec<String> = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect();
            if segments.is_empty() {
                continue;
            }
            set_path(&mut tree, &segments, parse_env_value(&raw))?;
            applied += 1;
        }
        if applied > 0 {
            *self = serde_json::from_value(tree)
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        Ok(applied)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.key_prefix is empty".into()));
        }
        if self.storage.key_prefix.contains(':') {
            return Err(ConfigError::Invalid(
                "storage.key_prefix must not contain ':'".into(),
            ));
        }
        if self.storage.schema_version == 0 {
            return Err(ConfigError::Invalid(
                "storage.schema_version must be at least 1".into(),
            ));
        }
        if self.storage.primary_dir == self.storage.fallback_dir {
            return Err(ConfigError::Invalid(
                "storage.primary_dir and storage.fallback_dir must differ".into(),
            ));
        }
        Ok(())
    }
}

fn set_path(tree: &mut Value, segments: &[String], value: Value) -> Result<(), ConfigError> {
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };
    let mut cursor = tree;
    for segment in parents {
        let Value::Object(map) = cursor else {
            return Err(ConfigError::Invalid(format!(
                "{} does not name a section",
                segments.join(".")
            )));
        };
        cursor = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    match cursor {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        _ => Err(ConfigError::Invalid(format!(
            "{} does not name a section",
            segments.join(".")
        ))),
    }
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}
