use super::entity::{Entity, EntityId, Vec2};
use super::registry::World;

/// Axis-aligned screen rectangle in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn centered(center: Vec2, width: f32, height: f32) -> Self {
        Self {
            x: center.x - width * 0.5,
            y: center.y - height * 0.5,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// World-to-screen mapping supplied by whoever draws the world.
pub trait ScreenProjection {
    fn footprint(&self, entity: &Entity) -> ScreenRect;
}

/// Camera-relative tile mapping: one world unit is `tile_size_px` pixels,
/// world y points up, and the player is always drawn at the viewport centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileProjection {
    pub camera: Vec2,
    pub tile_size_px: f32,
    pub viewport: (u32, u32),
}

impl TileProjection {
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        let (width, height) = self.viewport;
        Vec2 {
            x: (world.x - self.camera.x) * self.tile_size_px + width as f32 * 0.5,
            y: height as f32 * 0.5 - (world.y - self.camera.y) * self.tile_size_px,
        }
    }

    fn viewport_center(&self) -> Vec2 {
        Vec2 {
            x: self.viewport.0 as f32 * 0.5,
            y: self.viewport.1 as f32 * 0.5,
        }
    }
}

impl ScreenProjection for TileProjection {
    fn footprint(&self, entity: &Entity) -> ScreenRect {
        let size = entity.kind().footprint_tiles();
        let center = if entity.is_player() {
            self.viewport_center()
        } else {
            self.world_to_screen(entity.position)
        };
        ScreenRect::centered(
            center,
            size.x * self.tile_size_px,
            size.y * self.tile_size_px,
        )
    }
}

impl World {
    /// Every entity whose footprint contains `point`, in insertion order.
    pub fn entities_at_screen_point<'a, P>(
        &'a self,
        point: Vec2,
        projection: &'a P,
    ) -> impl Iterator<Item = &'a Entity> + 'a
    where
        P: ScreenProjection,
    {
        self.entities()
            .filter(move |entity| projection.footprint(entity).contains(point))
    }

    /// The most recently added hit accepted by `filter`.
    pub fn pick_topmost_at_screen_point<P>(
        &self,
        point: Vec2,
        projection: &P,
        filter: impl Fn(&Entity) -> bool,
    ) -> Option<EntityId>
    where
        P: ScreenProjection,
    {
        self.entities_at_screen_point(point, projection)
            .filter(|&entity| filter(entity))
            .last()
            .map(Entity::id)
    }
}
