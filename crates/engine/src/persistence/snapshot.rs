use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::warn;

use crate::world::{Entity, EntityKind, Inventory, Vec2, World};

use super::PersistenceError;

/// Stored in `entities.quantity` for kinds without a quantity.
pub const QUANTITY_NOT_APPLICABLE: i64 = -1;

/// One `entities` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub position: Vec2,
    pub quantity: Option<u32>,
}

impl EntityRecord {
    pub fn stored_quantity(&self) -> i64 {
        self.quantity
            .map_or(QUANTITY_NOT_APPLICABLE, i64::from)
    }

    fn ordering_key(&self, other: &Self) -> Ordering {
        self.kind
            .type_tag()
            .cmp(other.kind.type_tag())
            .then_with(|| self.position.x.total_cmp(&other.position.x))
            .then_with(|| self.position.y.total_cmp(&other.position.y))
            .then_with(|| self.quantity.cmp(&other.quantity))
    }
}

/// One `player_inventory` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryRecord {
    pub item: EntityKind,
    pub quantity: u32,
}

/// Identity-free copy of what a save file holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub entities: Vec<EntityRecord>,
    pub player_inventory: Vec<InventoryRecord>,
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        let entities = world
            .entities()
            .map(|entity| EntityRecord {
                kind: entity.kind(),
                position: entity.position,
                quantity: entity.quantity(),
            })
            .collect();
        let player_inventory = world
            .player()
            .and_then(Entity::inventory)
            .map(|inventory| {
                inventory
                    .items()
                    .map(|(item, quantity)| InventoryRecord { item, quantity })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            entities,
            player_inventory,
        }
    }

    /// Builds a fresh world: the inventory is restacked first, then one
    /// entity per record. The last engineer becomes the player and receives
    /// the inventory.
    pub fn rebuild(
        &self,
        name: impl Into<String>,
        inventory_slots: usize,
    ) -> Result<World, PersistenceError> {
        let mut inventory = Inventory::new(inventory_slots);
        for record in &self.player_inventory {
            inventory
                .add_item(record.item, record.quantity)
                .map_err(PersistenceError::Inventory)?;
        }

        let player_index = self
            .entities
            .iter()
            .rposition(|record| record.kind == EntityKind::Engineer);
        if player_index.is_none() && !inventory.is_empty() {
            warn!(
                slots = inventory.len(),
                "saved_inventory_without_player_discarded"
            );
        }

        let mut player_inventory = Some(inventory);
        let mut entities = Vec::with_capacity(self.entities.len());
        for (index, record) in self.entities.iter().enumerate() {
            let mut entity = if record.kind == EntityKind::Engineer {
                Entity::engineer(record.position, inventory_slots)
            } else {
                Entity::new(record.kind, record.position).with_quantity(record.quantity)
            };
            if Some(index) == player_index {
                if let Some(inventory) = player_inventory.take() {
                    entity = entity.with_inventory(inventory);
                }
            }
            entities.push(entity);
        }

        let mut world = World::new(name);
        world
            .add_entities(entities)
            .map_err(PersistenceError::World)?;
        Ok(world)
    }

    /// Round-trip equivalence: same entity multiset and the same total per
    /// item kind in the player inventory.
    pub fn equivalent_to(&self, other: &WorldSnapshot) -> bool {
        let mut ours = self.entities.clone();
        let mut theirs = other.entities.clone();
        ours.sort_by(EntityRecord::ordering_key);
        theirs.sort_by(EntityRecord::ordering_key);
        ours == theirs && self.inventory_totals() == other.inventory_totals()
    }

    pub fn inventory_totals(&self) -> BTreeMap<&'static str, u64> {
        let mut totals = BTreeMap::new();
        for record in &self.player_inventory {
            *totals.entry(record.item.type_tag()).or_insert(0) += u64::from(record.quantity);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_world() -> World {
        let mut world = World::new("sample");
        let mut inventory = Inventory::new(4);
        inventory.add_item(EntityKind::Wood, 70).expect("wood");
        inventory.add_item(EntityKind::Coal, 3).expect("coal");
        world
            .add_entities(vec![
                Entity::new(EntityKind::Tile, Vec2::new(-1.0, 0.0)),
                Entity::new(EntityKind::Engineer, Vec2::new(0.5, 0.25)).with_inventory(inventory),
                Entity::new(EntityKind::IronOre, Vec2::new(5.0, -3.0)).with_quantity(Some(200)),
            ])
            .expect("sample");
        world
    }

    #[test]
    fn capture_records_entities_in_order_with_sentinel_quantities() {
        let snapshot = WorldSnapshot::capture(&sample_world());
        let kinds: Vec<EntityKind> = snapshot.entities.iter().map(|record| record.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Tile, EntityKind::Engineer, EntityKind::IronOre]
        );
        assert_eq!(snapshot.entities[0].stored_quantity(), QUANTITY_NOT_APPLICABLE);
        assert_eq!(snapshot.entities[2].stored_quantity(), 200);
        assert_eq!(
            snapshot.player_inventory,
            vec![
                InventoryRecord {
                    item: EntityKind::Wood,
                    quantity: 64
                },
                InventoryRecord {
                    item: EntityKind::Wood,
                    quantity: 6
                },
                InventoryRecord {
                    item: EntityKind::Coal,
                    quantity: 3
                },
            ]
        );
    }

    #[test]
    fn rebuild_attaches_inventory_to_player() {
        let snapshot = WorldSnapshot::capture(&sample_world());
        let rebuilt = snapshot.rebuild("rebuilt", 4).expect("rebuild");

        let player = rebuilt.player().expect("player");
        assert_eq!(player.kind(), EntityKind::Engineer);
        assert_eq!(player.position, Vec2::new(0.5, 0.25));
        assert!(WorldSnapshot::capture(&rebuilt).equivalent_to(&snapshot));
        assert_eq!(WorldSnapshot::capture(&rebuilt), snapshot);
    }

    #[test]
    fn rebuild_fails_when_inventory_exceeds_slots() {
        let snapshot = WorldSnapshot::capture(&sample_world());
        let err = snapshot.rebuild("small", 1).expect_err("three slots needed");
        assert!(matches!(err, PersistenceError::Inventory(_)));
    }

    #[test]
    fn equivalence_ignores_entity_order() {
        let snapshot = WorldSnapshot::capture(&sample_world());
        let mut reversed = snapshot.clone();
        reversed.entities.reverse();
        assert!(snapshot.equivalent_to(&reversed));

        reversed.entities[0].quantity = Some(1);
        assert!(!snapshot.equivalent_to(&reversed));
    }
}
