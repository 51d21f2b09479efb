use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod config;
pub mod persistence;
pub mod world;

pub use config::{ConfigError, GameConfig, CONFIG_FILE_NAME};
pub use persistence::{
    EntityRecord, InventoryRecord, PersistenceError, PersistenceGateway, SaveCatalog,
    SaveSummary, WorldSnapshot,
};
pub use world::{
    Entity, EntityId, EntityKind, Inventory, InventoryError, ItemStack, MineOutcome,
    MiningBehavior, ScreenProjection, ScreenRect, TileProjection, TransientMessage, Vec2, World,
    WorldError, WorldId, DEFAULT_INVENTORY_SLOTS, MINE_RANGE,
};

pub const ROOT_ENV_VAR: &str = "FACTORY_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE_NAME);
        Self { root, config_path }
    }

    /// Relative save directories are resolved against the root.
    pub fn save_dir(&self, config: &GameConfig) -> PathBuf {
        if config.save_dir.is_absolute() {
            config.save_dir.clone()
        } else {
            self.root.join(&config.save_dir)
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error(
        "{env_var} is set but does not point to an existing directory: {path}\n\
Unset it to run from the current directory, or export a valid root, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/factory\""
    )]
    InvalidEnvRoot {
        path: PathBuf,
        env_var: &'static str,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root(env::var(ROOT_ENV_VAR))?;
    Ok(AppPaths::for_root(root))
}

fn resolve_root(value: Result<String, env::VarError>) -> Result<PathBuf, StartupError> {
    match value {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if normalized.is_dir() {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let cwd = env::current_dir().map_err(StartupError::CurrentDir)?;
            Ok(normalize_path(&cwd))
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
