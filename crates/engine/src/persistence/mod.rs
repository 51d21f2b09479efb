mod catalog;
mod gateway;
mod schema;
mod snapshot;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::world::{EntityKind, InventoryError, WorldError};

pub use catalog::SaveCatalog;
pub use gateway::{PersistenceGateway, SaveSummary};
pub use schema::{ENTITIES_TABLE, PLAYER_INVENTORY_TABLE, SCHEMA_VERSION};
pub use snapshot::{EntityRecord, InventoryRecord, WorldSnapshot, QUANTITY_NOT_APPLICABLE};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("save file not found: {path}")]
    SaveFileNotFound { path: PathBuf },
    #[error("save file {path} is missing table '{table}'")]
    SchemaMissing { path: PathBuf, table: &'static str },
    #[error("save file {path} uses schema version {found}, newest supported is {supported}")]
    UnsupportedSchemaVersion {
        path: PathBuf,
        found: i64,
        supported: i64,
    },
    #[error("unknown entity type '{tag}' in {table} row {row_id}")]
    UnknownEntityType {
        table: &'static str,
        row_id: i64,
        tag: String,
    },
    #[error("{kind} at entity index {index} has a non-finite position ({x}, {y})")]
    InvalidPosition {
        index: usize,
        kind: EntityKind,
        x: f32,
        y: f32,
    },
    #[error("invalid quantity {value} in {table} row {row_id}")]
    InvalidQuantity {
        table: &'static str,
        row_id: i64,
        value: i64,
    },
    #[error("failed to write save file {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to read save file {path}: {source}")]
    StorageRead {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to prepare save directory {path}: {source}")]
    SaveDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid save name '{name}': {reason}")]
    InvalidSaveName { name: String, reason: &'static str },
    #[error("saved inventory does not fit: {0}")]
    Inventory(#[source] InventoryError),
    #[error("saved world is inconsistent: {0}")]
    World(#[source] WorldError),
}
