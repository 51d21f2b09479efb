use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Transaction};

use super::PersistenceError;

pub const ENTITIES_TABLE: &str = "entities";
pub const PLAYER_INVENTORY_TABLE: &str = "player_inventory";

/// Stored in `PRAGMA user_version`. Stores written before versioning read
/// back as 0 and share the version 1 layout.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_ENTITIES: &str = "CREATE TABLE IF NOT EXISTS entities (\
    id INTEGER PRIMARY KEY, \
    type TEXT, \
    posX INTEGER, \
    posY INTEGER, \
    quantity INTEGER)";

const CREATE_PLAYER_INVENTORY: &str = "CREATE TABLE IF NOT EXISTS player_inventory (\
    id INTEGER PRIMARY KEY, \
    item TEXT, \
    quantity INTEGER)";

/// Refuses stores written by a newer layout, then creates both tables if
/// missing and stamps the schema version. Runs inside the save transaction
/// so a failure leaves the previous commit intact.
pub(crate) fn ensure_schema(tx: &Transaction<'_>, path: &Path) -> Result<(), PersistenceError> {
    let write_error = |source: rusqlite::Error| PersistenceError::StorageWrite {
        path: path.to_path_buf(),
        source,
    };
    check_version(stored_version(tx).map_err(write_error)?, path)?;
    tx.execute(CREATE_ENTITIES, []).map_err(write_error)?;
    tx.execute(CREATE_PLAYER_INVENTORY, [])
        .map_err(write_error)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(write_error)?;
    Ok(())
}

/// Checked once per open, before any row is read.
pub(crate) fn verify_schema(conn: &Connection, path: &Path) -> Result<(), PersistenceError> {
    let version = stored_version(conn).map_err(|source| PersistenceError::StorageRead {
        path: path.to_path_buf(),
        source,
    })?;
    check_version(version, path)?;

    for table in [ENTITIES_TABLE, PLAYER_INVENTORY_TABLE] {
        if !table_exists(conn, table).map_err(|source| PersistenceError::StorageRead {
            path: path.to_path_buf(),
            source,
        })? {
            return Err(PersistenceError::SchemaMissing {
                path: path.to_path_buf(),
                table,
            });
        }
    }
    Ok(())
}

fn stored_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

fn check_version(found: i64, path: &Path) -> Result<(), PersistenceError> {
    if found > SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedSchemaVersion {
            path: path.to_path_buf(),
            found,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}
