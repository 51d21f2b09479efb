use std::fmt::Display;
use std::path::PathBuf;

use factory_engine::{
    Entity, EntityId, EntityKind, GameConfig, MineOutcome, PersistenceGateway, SaveCatalog,
    TileProjection, Vec2, World,
};
use tracing::{info, warn};

use super::console::{self, SessionCommand};
use super::menu::{MenuEffect, MenuInput, MenuState};

pub(crate) const VIEWPORT_PX: (u32, u32) = (800, 600);
const SEED_TILE_RADIUS: i32 = 3;
const NEW_WORLD_NAME: &str = "new world";

/// A running game: the world plus everything the shell needs to drive it.
/// Core failures never end the session; they become the world's transient
/// message.
pub(crate) struct GameSession {
    world: World,
    config: GameConfig,
    catalog: SaveCatalog,
    gateway: PersistenceGateway,
    menu: MenuState,
    quit_requested: bool,
}

impl GameSession {
    pub(crate) fn new(config: GameConfig, save_dir: PathBuf) -> Self {
        let world = new_game_world(&config);
        Self {
            world,
            catalog: SaveCatalog::new(save_dir),
            gateway: PersistenceGateway::new(config.inventory_slots),
            config,
            menu: MenuState::Closed,
            quit_requested: false,
        }
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn menu(&self) -> MenuState {
        self.menu
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub(crate) fn tick(&mut self, dt_seconds: f32) {
        self.world.tick(dt_seconds);
    }

    /// Parses and runs one console line, returning the lines to print.
    pub(crate) fn handle_line(&mut self, line: &str) -> Vec<String> {
        match console::parse_line(line) {
            Ok(Some(command)) => self.execute(command),
            Ok(None) => Vec::new(),
            Err(error) => vec![error],
        }
    }

    pub(crate) fn execute(&mut self, command: SessionCommand) -> Vec<String> {
        match command {
            SessionCommand::Help => console::help_lines().collect(),
            SessionCommand::Spawn {
                kind,
                position,
                quantity,
            } => self.spawn(kind, position, quantity),
            SessionCommand::Teleport { position } => self.teleport(position),
            SessionCommand::Mine { target } => self.mine(target),
            SessionCommand::Click { screen } => self.click(screen),
            SessionCommand::Inventory => self.inventory_lines(),
            SessionCommand::List => self.entity_lines(),
            SessionCommand::Save { name } => self.save(&name),
            SessionCommand::Load { name } => self.load(&name),
            SessionCommand::Saves => self.save_lines(),
            SessionCommand::Menu(input) => self.apply_menu(input),
            SessionCommand::NewGame => {
                self.world = new_game_world(&self.config);
                self.menu = MenuState::Closed;
                info!(entity_count = self.world.len(), "new_game_started");
                vec![format!("started a new world with {} entities", self.world.len())]
            }
            SessionCommand::Quit => {
                self.quit_requested = true;
                vec!["bye".to_string()]
            }
        }
    }

    pub(crate) fn projection(&self) -> TileProjection {
        TileProjection {
            camera: self.world.player().map_or(Vec2::ZERO, |player| player.position),
            tile_size_px: self.config.tile_size_px,
            viewport: VIEWPORT_PX,
        }
    }

    fn spawn(&mut self, kind: EntityKind, position: Vec2, quantity: Option<u32>) -> Vec<String> {
        let entity = match kind {
            EntityKind::Engineer => Entity::engineer(position, self.config.inventory_slots),
            _ => Entity::new(kind, position).with_quantity(quantity),
        };
        match self.world.add_entity(entity) {
            Ok(id) => vec![format!(
                "spawned {kind} #{id} at ({}, {})",
                position.x, position.y
            )],
            Err(error) => self.report(error),
        }
    }

    fn teleport(&mut self, position: Vec2) -> Vec<String> {
        match self.world.player_mut() {
            Some(player) => {
                player.position = position;
                vec![format!("player moved to ({}, {})", position.x, position.y)]
            }
            None => self.report("there is no player in this world"),
        }
    }

    fn mine(&mut self, target: EntityId) -> Vec<String> {
        let Some(player_id) = self.world.player_id() else {
            return self.report("there is no player in this world");
        };
        match self.world.mine(player_id, target) {
            Ok(outcome) => vec![describe_outcome(outcome)],
            Err(error) => self.report(error),
        }
    }

    fn click(&mut self, screen: Vec2) -> Vec<String> {
        let projection = self.projection();
        let picked = self
            .world
            .pick_topmost_at_screen_point(screen, &projection, |entity| {
                entity.kind().mining_behavior().is_some()
            });
        match picked {
            Some(target) => self.mine(target),
            None => vec!["nothing to mine there".to_string()],
        }
    }

    fn inventory_lines(&mut self) -> Vec<String> {
        let Some(inventory) = self.world.player().and_then(Entity::inventory) else {
            return self.report("there is no player in this world");
        };
        let mut lines = vec![format!(
            "inventory {}/{} slots",
            inventory.len(),
            inventory.max_slots()
        )];
        lines.extend(
            inventory
                .slots()
                .iter()
                .enumerate()
                .map(|(slot, stack)| format!("  [{slot}] {} x{}", stack.item, stack.quantity)),
        );
        lines
    }

    fn entity_lines(&self) -> Vec<String> {
        let mut tiles = 0usize;
        let mut lines = Vec::new();
        for entity in self.world.entities() {
            if entity.kind() == EntityKind::Tile {
                tiles += 1;
                continue;
            }
            let mut line = format!(
                "#{} {} at ({}, {})",
                entity.id(),
                entity.kind(),
                entity.position.x,
                entity.position.y
            );
            if let Some(quantity) = entity.quantity() {
                line.push_str(&format!(" quantity {quantity}"));
            }
            if entity.is_player() {
                line.push_str(" [player]");
            }
            lines.push(line);
        }
        lines.push(format!("{tiles} tiles"));
        lines
    }

    fn save(&mut self, name: &str) -> Vec<String> {
        let result = self
            .catalog
            .path_for(name)
            .and_then(|path| self.gateway.save(&path, &self.world));
        match result {
            Ok(summary) => {
                self.menu = self.menu.after_selection();
                self.world
                    .set_message("Game saved", self.config.message_ttl_seconds);
                vec![format!(
                    "saved {} entities and {} inventory slots to {}",
                    summary.entity_rows,
                    summary.inventory_rows,
                    summary.path.display()
                )]
            }
            Err(error) => self.report(error),
        }
    }

    fn load(&mut self, name: &str) -> Vec<String> {
        let result = self
            .catalog
            .path_for(name)
            .and_then(|path| self.gateway.load(&path));
        match result {
            Ok(world) => {
                self.world = world;
                self.menu = self.menu.after_selection();
                self.world
                    .set_message("Game loaded", self.config.message_ttl_seconds);
                vec![format!(
                    "loaded '{}' with {} entities",
                    self.world.name(),
                    self.world.len()
                )]
            }
            Err(error) => self.report(error),
        }
    }

    fn save_lines(&mut self) -> Vec<String> {
        match self.catalog.list() {
            Ok(names) if names.is_empty() => vec![format!(
                "no saves in {}",
                self.catalog.dir().display()
            )],
            Ok(names) => names.into_iter().map(|name| format!("  {name}")).collect(),
            Err(error) => self.report(error),
        }
    }

    fn apply_menu(&mut self, input: MenuInput) -> Vec<String> {
        let (next, effect) = self.menu.apply(input);
        self.menu = next;
        let mut lines = vec![format!("menu: {}", next.label())];
        match effect {
            MenuEffect::None => {}
            MenuEffect::ListSaves => lines.extend(self.save_lines()),
            MenuEffect::Quit => self.quit_requested = true,
        }
        lines
    }

    fn report(&mut self, error: impl Display) -> Vec<String> {
        let text = error.to_string();
        warn!(error = %text, "command_failed");
        self.world.set_message(text, self.config.message_ttl_seconds);
        Vec::new()
    }
}

fn describe_outcome(outcome: MineOutcome) -> String {
    match outcome {
        MineOutcome::Mined {
            item,
            quantity,
            remaining,
        } => format!("mined {quantity} {item}, {remaining} left"),
        MineOutcome::Depleted { item, quantity } => {
            format!("mined {quantity} {item}, target depleted")
        }
        MineOutcome::OutOfRange => "target is out of range".to_string(),
        MineOutcome::NotMineable => "target cannot be mined".to_string(),
    }
}

/// Sand floor around the origin, a handful of resources within reach and
/// the engineer on top.
pub(crate) fn new_game_world(config: &GameConfig) -> World {
    let mut entities = Vec::new();
    for y in -SEED_TILE_RADIUS..=SEED_TILE_RADIUS {
        for x in -SEED_TILE_RADIUS..=SEED_TILE_RADIUS {
            entities.push(Entity::new(
                EntityKind::Tile,
                Vec2::new(x as f32, y as f32),
            ));
        }
    }
    entities.extend([
        Entity::new(EntityKind::IronOre, Vec2::new(4.0, -2.0)).with_quantity(Some(200)),
        Entity::new(EntityKind::CopperOre, Vec2::new(-4.0, 2.0)),
        Entity::new(EntityKind::Coal, Vec2::new(2.0, 3.0)),
        Entity::new(EntityKind::Tree, Vec2::new(-2.0, -3.0)),
        Entity::new(EntityKind::Tree, Vec2::new(-3.0, -1.0)),
        Entity::new(EntityKind::Oven, Vec2::new(1.0, 2.0)),
        Entity::engineer(Vec2::ZERO, config.inventory_slots),
    ]);

    let mut world = World::new(NEW_WORLD_NAME);
    if let Err(error) = world.add_entities(entities) {
        // Freshly constructed entities always have unique ids and no world.
        warn!(error = %error, "new_game_seed_failed");
    }
    world
}
