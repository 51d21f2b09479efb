use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::debug;

use super::entity::{Entity, EntityId};
use super::inventory::InventoryError;

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(pub u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("entity {entity_id} is already in this world")]
    DuplicateEntity { entity_id: EntityId },
    #[error("entity {entity_id} still belongs to world {world_id:?}")]
    AlreadyInWorld {
        entity_id: EntityId,
        world_id: WorldId,
    },
    #[error("entity {entity_id} is not in this world")]
    EntityNotFound { entity_id: EntityId },
    #[error("entity {entity_id} has no inventory")]
    MissingInventory { entity_id: EntityId },
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransientMessage {
    pub text: String,
    pub ttl_seconds: f32,
}

/// Registry of live entities.
///
/// Iteration follows insertion order. At most one member is the designated
/// player, and every member's world id equals [`World::id`].
#[derive(Debug)]
pub struct World {
    id: WorldId,
    name: String,
    order: Vec<EntityId>,
    entities: HashMap<EntityId, Entity>,
    player: Option<EntityId>,
    message: Option<TransientMessage>,
}

impl Default for World {
    fn default() -> Self {
        Self::new("world")
    }
}

impl World {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorldId(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            order: Vec::new(),
            entities: HashMap::new(),
            player: None,
            message: None,
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, WorldError> {
        self.check_insertable(&entity)?;
        Ok(self.insert(entity))
    }

    /// Adds every entity or none of them.
    pub fn add_entities(
        &mut self,
        entities: impl IntoIterator<Item = Entity>,
    ) -> Result<Vec<EntityId>, WorldError> {
        let entities: Vec<Entity> = entities.into_iter().collect();
        let mut batch_ids = HashSet::with_capacity(entities.len());
        for entity in &entities {
            self.check_insertable(entity)?;
            if !batch_ids.insert(entity.id()) {
                return Err(WorldError::DuplicateEntity {
                    entity_id: entity.id(),
                });
            }
        }
        Ok(entities
            .into_iter()
            .map(|entity| self.insert(entity))
            .collect())
    }

    /// Detaches and returns the entity. Clears the player designation when
    /// the player is removed.
    pub fn remove_entity(&mut self, entity_id: EntityId) -> Option<Entity> {
        let mut entity = self.entities.remove(&entity_id)?;
        self.order.retain(|id| *id != entity_id);
        entity.set_world(None);
        if self.player == Some(entity_id) {
            self.player = None;
        }
        debug!(
            world = %self.name,
            entity_id = entity_id.0,
            kind = %entity.kind(),
            "world_entity_removed"
        );
        Some(entity)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entities.contains_key(&entity_id)
    }

    /// Whether `entity` is a member of this registry.
    pub fn owns(&self, entity: &Entity) -> bool {
        entity.world() == Some(self.id) && self.contains(entity.id())
    }

    pub fn entity(&self, entity_id: EntityId) -> Option<&Entity> {
        self.entities.get(&entity_id)
    }

    pub fn entity_mut(&mut self, entity_id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&entity_id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    pub fn entity_ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.player
    }

    pub fn player(&self) -> Option<&Entity> {
        self.player.and_then(|id| self.entities.get(&id))
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.player.and_then(|id| self.entities.get_mut(&id))
    }

    pub fn set_message(&mut self, text: impl Into<String>, ttl_seconds: f32) {
        self.message = Some(TransientMessage {
            text: text.into(),
            ttl_seconds,
        });
    }

    pub fn message(&self) -> Option<&TransientMessage> {
        self.message.as_ref()
    }

    /// Advances transient state by one frame.
    pub fn tick(&mut self, dt_seconds: f32) {
        if let Some(message) = &mut self.message {
            message.ttl_seconds -= dt_seconds;
            if message.ttl_seconds <= 0.0 {
                self.message = None;
            }
        }
    }

    fn check_insertable(&self, entity: &Entity) -> Result<(), WorldError> {
        if self.entities.contains_key(&entity.id()) {
            return Err(WorldError::DuplicateEntity {
                entity_id: entity.id(),
            });
        }
        if let Some(world_id) = entity.world() {
            return Err(WorldError::AlreadyInWorld {
                entity_id: entity.id(),
                world_id,
            });
        }
        Ok(())
    }

    fn insert(&mut self, mut entity: Entity) -> EntityId {
        let entity_id = entity.id();
        entity.set_world(Some(self.id));
        if entity.is_player() {
            // Last player added wins the designation.
            if let Some(previous) = self.player.and_then(|id| self.entities.get_mut(&id)) {
                previous.clear_player_flag();
            }
            self.player = Some(entity_id);
        }
        debug!(
            world = %self.name,
            entity_id = entity_id.0,
            kind = %entity.kind(),
            is_player = entity.is_player(),
            "world_entity_added"
        );
        self.order.push(entity_id);
        self.entities.insert(entity_id, entity);
        entity_id
    }
}
