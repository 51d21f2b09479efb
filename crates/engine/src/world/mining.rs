use tracing::debug;

use super::entity::{EntityId, EntityKind, MiningBehavior};
use super::registry::{World, WorldError};

/// Actors must be strictly closer than this, in world units, to mine.
pub const MINE_RANGE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineOutcome {
    /// Too far away; nothing changed.
    OutOfRange,
    /// Target has no mining behaviour; nothing changed.
    NotMineable,
    /// Yield transferred, target still active.
    Mined {
        item: EntityKind,
        quantity: u32,
        remaining: u32,
    },
    /// Yield transferred and the target left the world.
    Depleted { item: EntityKind, quantity: u32 },
}

impl World {
    /// Mines `target_id` on behalf of `actor_id`, moving the yield into the
    /// actor's inventory.
    ///
    /// A full inventory fails the call with no change to either entity.
    pub fn mine(
        &mut self,
        actor_id: EntityId,
        target_id: EntityId,
    ) -> Result<MineOutcome, WorldError> {
        let actor = self
            .entity(actor_id)
            .ok_or(WorldError::EntityNotFound {
                entity_id: actor_id,
            })?;
        let target = self
            .entity(target_id)
            .ok_or(WorldError::EntityNotFound {
                entity_id: target_id,
            })?;

        let Some(behavior) = target.kind().mining_behavior() else {
            return Ok(MineOutcome::NotMineable);
        };
        let distance = actor.distance_to(target);
        if distance >= MINE_RANGE {
            debug!(
                actor_id = actor_id.0,
                target_id = target_id.0,
                distance,
                "mine_out_of_range"
            );
            return Ok(MineOutcome::OutOfRange);
        }

        let item = target.item_name().unwrap_or(target.kind());
        let available = target.quantity().unwrap_or(0);
        let taken = match behavior {
            MiningBehavior::Depletable => available.min(1),
            MiningBehavior::Mineable => available,
        };
        let remaining = available - taken;

        if taken > 0 {
            self.entity_mut(actor_id)
                .and_then(|actor| actor.inventory_mut())
                .ok_or(WorldError::MissingInventory {
                    entity_id: actor_id,
                })?
                .add_item(item, taken)?;
        }

        let depleted = remaining == 0 || behavior == MiningBehavior::Mineable;
        if depleted {
            self.remove_entity(target_id);
            debug!(
                actor_id = actor_id.0,
                target_id = target_id.0,
                item = %item,
                quantity = taken,
                "mine_depleted"
            );
            return Ok(MineOutcome::Depleted {
                item,
                quantity: taken,
            });
        }

        if let Some(target) = self.entity_mut(target_id) {
            target.set_quantity(Some(remaining));
        }
        debug!(
            actor_id = actor_id.0,
            target_id = target_id.0,
            item = %item,
            remaining,
            "mine_succeeded"
        );
        Ok(MineOutcome::Mined {
            item,
            quantity: taken,
            remaining,
        })
    }
}
