use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::inventory::{Inventory, DEFAULT_INVENTORY_SLOTS};
use super::registry::WorldId;

pub const DEFAULT_MAX_STACK_SIZE: u32 = 64;
/// Height over width of the engineer sprite sheet frames (512 / 148).
pub const ENGINEER_ASPECT_RATIO: f32 = 3.459;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl EntityId {
    fn allocate() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Tile,
    Engineer,
    IronOre,
    CopperOre,
    Coal,
    Tree,
    Wood,
    Oven,
    Cursor,
}

/// How an entity responds to being mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningBehavior {
    /// Yields one unit per mine action until its quantity runs out.
    Depletable,
    /// Yields its whole quantity in one mine action and leaves the world.
    Mineable,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Tile,
        EntityKind::Engineer,
        EntityKind::IronOre,
        EntityKind::CopperOre,
        EntityKind::Coal,
        EntityKind::Tree,
        EntityKind::Wood,
        EntityKind::Oven,
        EntityKind::Cursor,
    ];

    /// Tag stored in save files.
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Tile => "Tile",
            Self::Engineer => "Engineer",
            Self::IronOre => "IronOre",
            Self::CopperOre => "CopperOre",
            Self::Coal => "Coal",
            Self::Tree => "Tree",
            Self::Wood => "Wood",
            Self::Oven => "Oven",
            Self::Cursor => "Cursor",
        }
    }

    pub fn mining_behavior(self) -> Option<MiningBehavior> {
        match self {
            Self::IronOre | Self::CopperOre | Self::Coal => Some(MiningBehavior::Depletable),
            Self::Tree | Self::Oven => Some(MiningBehavior::Mineable),
            Self::Tile | Self::Engineer | Self::Wood | Self::Cursor => None,
        }
    }

    /// Item placed into the miner's inventory.
    pub fn yields(self) -> Option<EntityKind> {
        match self {
            Self::IronOre => Some(Self::IronOre),
            Self::CopperOre => Some(Self::CopperOre),
            Self::Coal => Some(Self::Coal),
            Self::Tree => Some(Self::Wood),
            Self::Oven => Some(Self::Oven),
            Self::Tile | Self::Engineer | Self::Wood | Self::Cursor => None,
        }
    }

    pub fn max_stack_size(self) -> u32 {
        match self {
            Self::Oven => 1,
            _ => DEFAULT_MAX_STACK_SIZE,
        }
    }

    /// Starting quantity for kinds that track one; `None` for kinds that are
    /// persisted with the `-1` sentinel.
    pub fn default_quantity(self) -> Option<u32> {
        match self {
            Self::IronOre | Self::CopperOre | Self::Coal => Some(100),
            Self::Tree => Some(4),
            Self::Oven => Some(1),
            Self::Tile | Self::Engineer | Self::Wood | Self::Cursor => None,
        }
    }

    pub fn has_quantity(self) -> bool {
        self.default_quantity().is_some()
    }

    pub fn sprite_key(self) -> &'static str {
        match self {
            Self::Tile => "terrain/sand",
            Self::Engineer => "actors/engineer",
            Self::IronOre => "resources/iron_ore",
            Self::CopperOre => "resources/copper_ore",
            Self::Coal => "resources/coal",
            Self::Tree => "resources/tree",
            Self::Wood => "items/wood",
            Self::Oven => "buildings/oven",
            Self::Cursor => "ui/cursor",
        }
    }

    /// Footprint in tiles, width by height.
    pub fn footprint_tiles(self) -> Vec2 {
        match self {
            Self::Engineer => Vec2::new(1.0, ENGINEER_ASPECT_RATIO),
            _ => Vec2::new(1.0, 1.0),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity type tag '{tag}'")]
pub struct UnknownEntityType {
    pub tag: String,
}

impl FromStr for EntityKind {
    type Err = UnknownEntityType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_tag() == raw)
            .ok_or_else(|| UnknownEntityType {
                tag: raw.to_string(),
            })
    }
}

/// A placeable, positioned object. World membership is tracked by id only;
/// the registry owning the entity is looked up through [`Entity::world`].
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    pub position: Vec2,
    quantity: Option<u32>,
    is_player: bool,
    inventory: Option<Inventory>,
    world: Option<WorldId>,
}

impl Entity {
    pub fn new(kind: EntityKind, position: Vec2) -> Self {
        let is_player = kind == EntityKind::Engineer;
        Self {
            id: EntityId::allocate(),
            kind,
            position,
            quantity: kind.default_quantity(),
            is_player,
            inventory: is_player.then(|| Inventory::new(DEFAULT_INVENTORY_SLOTS)),
            world: None,
        }
    }

    /// An engineer carrying an empty inventory of `inventory_slots` slots.
    pub fn engineer(position: Vec2, inventory_slots: usize) -> Self {
        Self::new(EntityKind::Engineer, position).with_inventory(Inventory::new(inventory_slots))
    }

    /// Overrides the starting quantity. Ignored for kinds without one.
    pub fn with_quantity(mut self, quantity: Option<u32>) -> Self {
        if self.kind.has_quantity() {
            self.quantity = quantity.or(self.kind.default_quantity());
        }
        self
    }

    pub fn with_inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn quantity(&self) -> Option<u32> {
        self.quantity
    }

    /// What collecting this entity puts into an inventory.
    pub fn item_name(&self) -> Option<EntityKind> {
        self.kind.yields()
    }

    pub fn max_stack_size(&self) -> u32 {
        self.kind.max_stack_size()
    }

    pub fn is_player(&self) -> bool {
        self.is_player
    }

    pub fn world(&self) -> Option<WorldId> {
        self.world
    }

    pub fn inventory(&self) -> Option<&Inventory> {
        self.inventory.as_ref()
    }

    pub fn inventory_mut(&mut self) -> Option<&mut Inventory> {
        self.inventory.as_mut()
    }

    pub fn distance_to(&self, other: &Entity) -> f32 {
        self.position.distance(other.position)
    }

    pub(crate) fn set_world(&mut self, world: Option<WorldId>) {
        self.world = world;
    }

    pub(crate) fn set_quantity(&mut self, quantity: Option<u32>) {
        self.quantity = quantity;
    }

    pub(crate) fn clear_player_flag(&mut self) {
        self.is_player = false;
    }
}
