mod entity;
mod inventory;
mod mining;
mod projection;
mod registry;

pub use entity::{
    Entity, EntityId, EntityKind, MiningBehavior, UnknownEntityType, Vec2,
    DEFAULT_MAX_STACK_SIZE, ENGINEER_ASPECT_RATIO,
};
pub use inventory::{Inventory, InventoryError, ItemStack, DEFAULT_INVENTORY_SLOTS};
pub use mining::{MineOutcome, MINE_RANGE};
pub use projection::{ScreenProjection, ScreenRect, TileProjection};
pub use registry::{TransientMessage, World, WorldError, WorldId};
