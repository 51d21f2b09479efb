use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};
use tracing::{info, warn};

use crate::world::{EntityKind, Vec2, World, DEFAULT_INVENTORY_SLOTS};

use super::schema::{self, ENTITIES_TABLE, PLAYER_INVENTORY_TABLE};
use super::snapshot::{EntityRecord, InventoryRecord, WorldSnapshot, QUANTITY_NOT_APPLICABLE};
use super::PersistenceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub path: PathBuf,
    pub entity_rows: usize,
    pub inventory_rows: usize,
}

/// Saves and loads worlds to SQLite files. Each call opens its own
/// connection and closes it before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceGateway {
    inventory_slots: usize,
}

impl Default for PersistenceGateway {
    fn default() -> Self {
        Self::new(DEFAULT_INVENTORY_SLOTS)
    }
}

impl PersistenceGateway {
    /// `inventory_slots` sizes the player inventory rebuilt on load.
    pub fn new(inventory_slots: usize) -> Self {
        Self { inventory_slots }
    }

    pub fn save(&self, path: &Path, world: &World) -> Result<SaveSummary, PersistenceError> {
        let snapshot = WorldSnapshot::capture(world);
        match self.save_snapshot(path, &snapshot) {
            Ok(summary) => {
                info!(
                    path = %path.display(),
                    entity_rows = summary.entity_rows,
                    inventory_rows = summary.inventory_rows,
                    "save_completed"
                );
                Ok(summary)
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "save_failed");
                Err(error)
            }
        }
    }

    /// Replaces the contents of the store at `path` with `snapshot` in one
    /// transaction.
    pub fn save_snapshot(
        &self,
        path: &Path,
        snapshot: &WorldSnapshot,
    ) -> Result<SaveSummary, PersistenceError> {
        check_positions(snapshot)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::SaveDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let existed = path.exists();
        if let Err(error) = write_snapshot(path, snapshot) {
            // Nothing was ever committed to a store this call created.
            if !existed {
                discard_new_store(path);
            }
            return Err(error);
        }

        Ok(SaveSummary {
            path: path.to_path_buf(),
            entity_rows: snapshot.entities.len(),
            inventory_rows: snapshot.player_inventory.len(),
        })
    }

    pub fn load(&self, path: &Path) -> Result<World, PersistenceError> {
        let result = self.load_snapshot(path).and_then(|snapshot| {
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("world");
            snapshot.rebuild(name, self.inventory_slots)
        });
        match &result {
            Ok(world) => info!(
                path = %path.display(),
                entity_count = world.len(),
                has_player = world.player_id().is_some(),
                "load_completed"
            ),
            Err(error) => warn!(path = %path.display(), error = %error, "load_failed"),
        }
        result
    }

    /// Reads and validates every row without building a world.
    pub fn load_snapshot(&self, path: &Path) -> Result<WorldSnapshot, PersistenceError> {
        if !path.is_file() {
            return Err(PersistenceError::SaveFileNotFound {
                path: path.to_path_buf(),
            });
        }
        let read_error = |source: rusqlite::Error| PersistenceError::StorageRead {
            path: path.to_path_buf(),
            source,
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(read_error)?;
        schema::verify_schema(&conn, path)?;

        let player_inventory = read_inventory_rows(&conn)
            .map_err(read_error)?
            .into_iter()
            .map(|(row_id, tag, quantity)| inventory_record(row_id, &tag, quantity))
            .collect::<Result<Vec<_>, _>>()?;
        let entities = read_entity_rows(&conn)
            .map_err(read_error)?
            .into_iter()
            .map(entity_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(WorldSnapshot {
            entities,
            player_inventory,
        })
    }
}

fn check_positions(snapshot: &WorldSnapshot) -> Result<(), PersistenceError> {
    match snapshot.entities.iter().enumerate().find(|(_, record)| {
        !record.position.x.is_finite() || !record.position.y.is_finite()
    }) {
        Some((index, record)) => Err(PersistenceError::InvalidPosition {
            index,
            kind: record.kind,
            x: record.position.x,
            y: record.position.y,
        }),
        None => Ok(()),
    }
}

fn write_snapshot(path: &Path, snapshot: &WorldSnapshot) -> Result<(), PersistenceError> {
    let write_error = |source: rusqlite::Error| PersistenceError::StorageWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut conn = Connection::open(path).map_err(write_error)?;
    let tx = conn.transaction().map_err(write_error)?;
    schema::ensure_schema(&tx, path)?;
    write_rows(&tx, snapshot).map_err(write_error)?;
    tx.commit().map_err(write_error)
}

fn discard_new_store(path: &Path) {
    for leftover in [path.to_path_buf(), journal_path(path)] {
        match fs::remove_file(&leftover) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                path = %leftover.display(),
                error = %error,
                "discard_new_store_failed"
            ),
        }
    }
}

fn journal_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push("-journal");
    PathBuf::from(raw)
}

fn write_rows(tx: &rusqlite::Transaction<'_>, snapshot: &WorldSnapshot) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM entities", [])?;
    tx.execute("DELETE FROM player_inventory", [])?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO entities (id, type, posX, posY, quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (row_id, record) in (1_i64..).zip(&snapshot.entities) {
            insert.execute(params![
                row_id,
                record.kind.type_tag(),
                f64::from(record.position.x),
                f64::from(record.position.y),
                record.stored_quantity(),
            ])?;
        }
    }
    {
        let mut insert =
            tx.prepare("INSERT INTO player_inventory (id, item, quantity) VALUES (?1, ?2, ?3)")?;
        for (row_id, record) in (1_i64..).zip(&snapshot.player_inventory) {
            insert.execute(params![row_id, record.item.type_tag(), record.quantity])?;
        }
    }
    Ok(())
}

struct EntityRow {
    row_id: i64,
    tag: String,
    pos_x: f64,
    pos_y: f64,
    quantity: i64,
}

fn read_entity_rows(conn: &Connection) -> rusqlite::Result<Vec<EntityRow>> {
    let mut stmt =
        conn.prepare("SELECT id, type, posX, posY, quantity FROM entities ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(EntityRow {
            row_id: row.get(0)?,
            tag: row.get(1)?,
            pos_x: row.get(2)?,
            pos_y: row.get(3)?,
            quantity: row.get::<_, Option<i64>>(4)?.unwrap_or(QUANTITY_NOT_APPLICABLE),
        })
    })?;
    rows.collect()
}

fn read_inventory_rows(conn: &Connection) -> rusqlite::Result<Vec<(i64, String, i64)>> {
    let mut stmt = conn.prepare("SELECT id, item, quantity FROM player_inventory ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
    rows.collect()
}

fn entity_record(row: EntityRow) -> Result<EntityRecord, PersistenceError> {
    let kind = parse_kind(ENTITIES_TABLE, row.row_id, &row.tag)?;
    let quantity = match row.quantity {
        QUANTITY_NOT_APPLICABLE => None,
        value => Some(u32::try_from(value).map_err(|_| PersistenceError::InvalidQuantity {
            table: ENTITIES_TABLE,
            row_id: row.row_id,
            value,
        })?),
    };
    Ok(EntityRecord {
        kind,
        position: Vec2::new(row.pos_x as f32, row.pos_y as f32),
        quantity,
    })
}

fn inventory_record(row_id: i64, tag: &str, quantity: i64) -> Result<InventoryRecord, PersistenceError> {
    let item = parse_kind(PLAYER_INVENTORY_TABLE, row_id, tag)?;
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|quantity| *quantity > 0)
        .ok_or(PersistenceError::InvalidQuantity {
            table: PLAYER_INVENTORY_TABLE,
            row_id,
            value: quantity,
        })?;
    Ok(InventoryRecord { item, quantity })
}

fn parse_kind(table: &'static str, row_id: i64, tag: &str) -> Result<EntityKind, PersistenceError> {
    tag.parse::<EntityKind>()
        .map_err(|error| PersistenceError::UnknownEntityType {
            table,
            row_id,
            tag: error.tag,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{SaveCatalog, SCHEMA_VERSION};
    use crate::world::{Entity, Inventory, MineOutcome};

    fn save_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    fn sample_world() -> World {
        let mut world = World::new("sample");
        let mut inventory = Inventory::new(DEFAULT_INVENTORY_SLOTS);
        inventory.add_item(EntityKind::Wood, 70).expect("wood");
        inventory.add_item(EntityKind::IronOre, 12).expect("iron");
        world
            .add_entities(vec![
                Entity::new(EntityKind::Tile, Vec2::new(0.0, 0.0)),
                Entity::new(EntityKind::Tile, Vec2::new(1.0, 0.0)),
                Entity::new(EntityKind::Engineer, Vec2::new(0.0, 0.0)).with_inventory(inventory),
                Entity::new(EntityKind::IronOre, Vec2::new(5.0, -3.0)).with_quantity(Some(200)),
                Entity::new(EntityKind::Tree, Vec2::new(-2.5, 4.75)).with_quantity(Some(4)),
                Entity::new(EntityKind::Oven, Vec2::new(3.0, 3.0)),
            ])
            .expect("sample");
        world
    }

    fn create_store(path: &Path, statements: &[&str]) {
        let conn = Connection::open(path).expect("open");
        for statement in statements {
            conn.execute_batch(statement).expect("statement");
        }
    }

    #[test]
    fn save_then_load_round_trips_world_and_inventory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "round_trip.db");
        let gateway = PersistenceGateway::default();
        let world = sample_world();

        let summary = gateway.save(&path, &world).expect("save");
        assert_eq!(summary.entity_rows, 6);
        assert_eq!(summary.inventory_rows, 3);

        let loaded = gateway.load(&path).expect("load");
        assert_eq!(loaded.name(), "round_trip");
        let before = WorldSnapshot::capture(&world);
        let after = WorldSnapshot::capture(&loaded);
        assert!(after.equivalent_to(&before));
        assert_eq!(after, before);
        assert_eq!(
            loaded.player().map(Entity::kind),
            Some(EntityKind::Engineer)
        );
        assert!(loaded.entities().all(|entity| loaded.owns(entity)));
    }

    #[test]
    fn empty_world_round_trips_to_empty_world() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "empty.db");
        let gateway = PersistenceGateway::default();

        gateway.save(&path, &World::new("empty")).expect("save");
        let loaded = gateway.load(&path).expect("load");
        assert!(loaded.is_empty());
        assert!(loaded.player().is_none());
        assert!(WorldSnapshot::capture(&loaded).player_inventory.is_empty());
    }

    #[test]
    fn saving_again_replaces_previous_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "overwrite.db");
        let gateway = PersistenceGateway::default();

        gateway.save(&path, &sample_world()).expect("first save");
        let mut smaller = World::new("smaller");
        smaller
            .add_entity(Entity::new(EntityKind::Coal, Vec2::new(1.0, 1.0)))
            .expect("coal");
        gateway.save(&path, &smaller).expect("second save");

        let snapshot = gateway.load_snapshot(&path).expect("snapshot");
        assert_eq!(snapshot.entities.len(), 1);
        assert!(snapshot.player_inventory.is_empty());
    }

    #[test]
    fn depleted_entity_is_not_saved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "depleted.db");
        let mut world = World::new("mined");
        let player = world
            .add_entity(Entity::new(EntityKind::Engineer, Vec2::ZERO))
            .expect("player");
        let ore = world
            .add_entity(Entity::new(EntityKind::IronOre, Vec2::new(1.0, 0.0)).with_quantity(Some(1)))
            .expect("ore");
        assert!(matches!(
            world.mine(player, ore).expect("mine"),
            MineOutcome::Depleted { .. }
        ));

        PersistenceGateway::default()
            .save(&path, &world)
            .expect("save");

        let conn = Connection::open(&path).expect("open");
        let ore_rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM entities WHERE type = 'IronOre'",
                [],
                |row| row.get(0),
            )
            .expect("count");
        let inventory: (String, i64) = conn
            .query_row("SELECT item, quantity FROM player_inventory", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("inventory row");
        assert_eq!(ore_rows, 0);
        assert_eq!(inventory, ("IronOre".to_string(), 1));
    }

    #[test]
    fn sentinel_quantity_is_written_for_kinds_without_quantity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "sentinel.db");
        PersistenceGateway::default()
            .save(&path, &sample_world())
            .expect("save");

        let conn = Connection::open(&path).expect("open");
        let quantities: Vec<(String, i64)> = conn
            .prepare("SELECT type, quantity FROM entities ORDER BY id")
            .expect("prepare")
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query")
            .collect::<rusqlite::Result<_>>()
            .expect("rows");
        assert_eq!(quantities[0], ("Tile".to_string(), -1));
        assert_eq!(quantities[2], ("Engineer".to_string(), -1));
        assert_eq!(quantities[3], ("IronOre".to_string(), 200));
    }

    #[test]
    fn load_missing_file_is_save_file_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = PersistenceGateway::default()
            .load(&save_path(&dir, "nope.db"))
            .expect_err("missing");
        assert!(matches!(err, PersistenceError::SaveFileNotFound { .. }));
        assert!(!save_path(&dir, "nope.db").exists());
    }

    #[test]
    fn load_without_player_inventory_table_is_schema_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "legacy.db");
        create_store(
            &path,
            &["CREATE TABLE entities (id INTEGER PRIMARY KEY, type TEXT, posX INTEGER, posY INTEGER, quantity INTEGER)"],
        );

        let err = PersistenceGateway::default()
            .load(&path)
            .expect_err("schema missing");
        assert!(matches!(
            err,
            PersistenceError::SchemaMissing {
                table: PLAYER_INVENTORY_TABLE,
                ..
            }
        ));
    }

    #[test]
    fn load_unversioned_store_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "unversioned.db");
        create_store(
            &path,
            &[
                "CREATE TABLE entities (id INTEGER PRIMARY KEY, type TEXT, posX INTEGER, posY INTEGER, quantity INTEGER)",
                "CREATE TABLE player_inventory (id INTEGER PRIMARY KEY, item TEXT, quantity INTEGER)",
                "INSERT INTO entities (type, posX, posY, quantity) VALUES ('Engineer', 2, 3, -1)",
                "INSERT INTO entities (type, posX, posY, quantity) VALUES ('Coal', 4, 3, 17)",
                "INSERT INTO player_inventory (item, quantity) VALUES ('Wood', 5)",
            ],
        );

        let world = PersistenceGateway::default().load(&path).expect("load");
        let player = world.player().expect("player");
        assert_eq!(player.position, Vec2::new(2.0, 3.0));
        assert_eq!(
            player.inventory().expect("inventory").items().collect::<Vec<_>>(),
            vec![(EntityKind::Wood, 5)]
        );
        let coal = world
            .entities()
            .find(|entity| entity.kind() == EntityKind::Coal)
            .expect("coal");
        assert_eq!(coal.quantity(), Some(17));
    }

    #[test]
    fn load_newer_schema_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "future.db");
        PersistenceGateway::default()
            .save(&path, &sample_world())
            .expect("save");
        create_store(&path, &["PRAGMA user_version = 99"]);

        let err = PersistenceGateway::default()
            .load(&path)
            .expect_err("too new");
        assert!(matches!(
            err,
            PersistenceError::UnsupportedSchemaVersion { found: 99, .. }
        ));
    }

    #[test]
    fn load_unknown_type_tag_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "corrupt.db");
        PersistenceGateway::default()
            .save(&path, &World::new("corrupt"))
            .expect("save");
        create_store(
            &path,
            &["INSERT INTO entities (type, posX, posY, quantity) VALUES ('Dragon', 0, 0, -1)"],
        );

        let err = PersistenceGateway::default()
            .load(&path)
            .expect_err("unknown tag");
        match err {
            PersistenceError::UnknownEntityType { table, tag, .. } => {
                assert_eq!(table, ENTITIES_TABLE);
                assert_eq!(tag, "Dragon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_rejects_non_positive_inventory_quantity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "bad_inventory.db");
        PersistenceGateway::default()
            .save(&path, &World::new("bad"))
            .expect("save");
        create_store(
            &path,
            &["INSERT INTO player_inventory (item, quantity) VALUES ('Coal', 0)"],
        );

        assert!(matches!(
            PersistenceGateway::default().load(&path),
            Err(PersistenceError::InvalidQuantity { value: 0, .. })
        ));
    }

    #[test]
    fn failed_save_leaves_previous_commit_readable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "guarded.db");
        let gateway = PersistenceGateway::default();
        gateway.save(&path, &sample_world()).expect("first save");

        // A trigger that aborts any insert makes the second write fail mid-transaction.
        create_store(
            &path,
            &["CREATE TRIGGER reject_insert BEFORE INSERT ON entities BEGIN SELECT RAISE(ABORT, 'rejected'); END"],
        );
        let err = gateway
            .save(&path, &sample_world())
            .expect_err("insert rejected");
        assert!(matches!(err, PersistenceError::StorageWrite { .. }));

        let snapshot = gateway.load_snapshot(&path).expect("prior commit intact");
        assert!(snapshot.equivalent_to(&WorldSnapshot::capture(&sample_world())));
    }

    #[test]
    fn save_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("slot1.db");
        PersistenceGateway::default()
            .save(&path, &World::new("nested"))
            .expect("save");
        assert!(path.is_file());
    }

    #[test]
    fn save_rejects_non_finite_position_before_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "nan.db");
        let gateway = PersistenceGateway::default();
        let mut world = World::new("nan");
        world
            .add_entities(vec![
                Entity::new(EntityKind::Tile, Vec2::new(0.0, 0.0)),
                Entity::new(EntityKind::Tile, Vec2::new(f32::NAN, 1.0)),
            ])
            .expect("tiles");

        let err = gateway.save(&path, &world).expect_err("nan position");
        assert!(matches!(
            err,
            PersistenceError::InvalidPosition {
                index: 1,
                kind: EntityKind::Tile,
                ..
            }
        ));
        assert!(!path.exists());

        gateway.save(&path, &sample_world()).expect("valid save");
        let mut infinite = World::new("infinite");
        infinite
            .add_entity(Entity::new(EntityKind::Coal, Vec2::new(f32::NEG_INFINITY, 0.0)))
            .expect("coal");
        assert!(matches!(
            gateway.save(&path, &infinite),
            Err(PersistenceError::InvalidPosition { index: 0, .. })
        ));
        let snapshot = gateway.load_snapshot(&path).expect("prior commit intact");
        assert!(snapshot.equivalent_to(&WorldSnapshot::capture(&sample_world())));
    }

    #[test]
    fn save_refuses_store_from_newer_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "future_layout.db");
        create_store(
            &path,
            &[
                "CREATE TABLE entities (id INTEGER PRIMARY KEY, type TEXT, posX INTEGER, posY INTEGER, quantity INTEGER, layer INTEGER)",
                "CREATE TABLE player_inventory (id INTEGER PRIMARY KEY, item TEXT, quantity INTEGER)",
                "INSERT INTO entities (type, posX, posY, quantity, layer) VALUES ('Tile', 0, 0, -1, 3)",
                "PRAGMA user_version = 2",
            ],
        );

        let err = PersistenceGateway::default()
            .save(&path, &sample_world())
            .expect_err("newer layout");
        assert!(matches!(
            err,
            PersistenceError::UnsupportedSchemaVersion {
                found: 2,
                supported: SCHEMA_VERSION,
                ..
            }
        ));

        let conn = Connection::open(&path).expect("open");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("version");
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM entities WHERE layer = 3", [], |row| {
                row.get(0)
            })
            .expect("count");
        assert_eq!(version, 2);
        assert_eq!(rows, 1);
    }

    #[test]
    fn failed_first_save_leaves_no_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = save_path(&dir, "fresh.db");
        // A directory in the journal's place makes the first write fail.
        fs::create_dir(journal_path(&path)).expect("journal dir");

        let err = PersistenceGateway::default()
            .save(&path, &sample_world())
            .expect_err("journal blocked");
        assert!(matches!(err, PersistenceError::StorageWrite { .. }));
        assert!(!path.exists());
        assert!(SaveCatalog::new(dir.path())
            .list()
            .expect("list")
            .is_empty());
    }
}
