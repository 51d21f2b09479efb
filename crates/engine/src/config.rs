use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::world::DEFAULT_INVENTORY_SLOTS;

pub const CONFIG_FILE_NAME: &str = "factory.json";
pub const SAVE_DIR_ENV_VAR: &str = "FACTORY_SAVE_DIR";
pub const INVENTORY_SLOTS_ENV_VAR: &str = "FACTORY_INVENTORY_SLOTS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    pub inventory_slots: usize,
    pub save_dir: PathBuf,
    pub message_ttl_seconds: f32,
    pub tile_size_px: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            inventory_slots: DEFAULT_INVENTORY_SLOTS,
            save_dir: PathBuf::from("save"),
            message_ttl_seconds: 3.0,
            tile_size_px: 64.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {path} ({field}): {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {var}")]
    EnvOverride { var: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl GameConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config_file_missing_using_defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::parse_json(&raw, path)?;
        config.validate()?;
        Ok(config)
    }

    /// [`GameConfig::load`] followed by the process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse_json(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(|error| {
            let field = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                field,
                source: error.into_inner(),
            }
        })
    }

    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(SAVE_DIR_ENV_VAR) {
            if value.trim().is_empty() {
                return Err(ConfigError::EnvOverride {
                    var: SAVE_DIR_ENV_VAR,
                    value,
                });
            }
            self.save_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(INVENTORY_SLOTS_ENV_VAR) {
            self.inventory_slots =
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ConfigError::EnvOverride {
                        var: INVENTORY_SLOTS_ENV_VAR,
                        value: value.clone(),
                    })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inventory_slots == 0 {
            return Err(ConfigError::Invalid(
                "inventory_slots must be at least 1".to_string(),
            ));
        }
        if !self.tile_size_px.is_finite() || self.tile_size_px <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tile_size_px must be a positive number, got {}",
                self.tile_size_px
            )));
        }
        if !self.message_ttl_seconds.is_finite() || self.message_ttl_seconds < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "message_ttl_seconds must be non-negative, got {}",
                self.message_ttl_seconds
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = GameConfig::load(&dir.path().join(CONFIG_FILE_NAME)).expect("defaults");
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "inventory_slots": 12 }"#).expect("write");

        let config = GameConfig::load(&path).expect("config");
        assert_eq!(config.inventory_slots, 12);
        assert_eq!(config.save_dir, PathBuf::from("save"));
    }

    #[test]
    fn parse_error_reports_field_path() {
        let err = GameConfig::parse_json(
            r#"{ "inventory_slots": "many" }"#,
            Path::new(CONFIG_FILE_NAME),
        )
        .expect_err("wrong type");
        match err {
            ConfigError::Parse { field, .. } => assert_eq!(field, "inventory_slots"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = GameConfig::parse_json(r#"{ "zoom": 3 }"#, Path::new(CONFIG_FILE_NAME))
            .expect_err("unknown field");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_slots_fail_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "inventory_slots": 0 }"#).expect("write");
        assert!(matches!(
            GameConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = GameConfig::default()
            .apply_overrides(|var| match var {
                SAVE_DIR_ENV_VAR => Some("/tmp/factory-saves".to_string()),
                INVENTORY_SLOTS_ENV_VAR => Some(" 16 ".to_string()),
                _ => None,
            })
            .expect("overrides");
        assert_eq!(config.save_dir, PathBuf::from("/tmp/factory-saves"));
        assert_eq!(config.inventory_slots, 16);
    }

    #[test]
    fn malformed_override_is_reported() {
        let err = GameConfig::default()
            .apply_overrides(|var| (var == INVENTORY_SLOTS_ENV_VAR).then(|| "lots".to_string()))
            .expect_err("not a number");
        assert!(matches!(
            err,
            ConfigError::EnvOverride {
                var: INVENTORY_SLOTS_ENV_VAR,
                ..
            }
        ));
    }
}
