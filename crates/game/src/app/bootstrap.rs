use factory_engine::{resolve_app_paths, GameConfig, StartupError};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::session::GameSession;

pub(crate) struct AppWiring {
    pub(crate) session: GameSession,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Factory Startup ===");

    let paths = resolve_app_paths()?;
    let config = GameConfig::load_with_env(&paths.config_path)?;
    let save_dir = paths.save_dir(&config);
    info!(
        root = %paths.root.display(),
        save_dir = %save_dir.display(),
        inventory_slots = config.inventory_slots,
        "config_resolved"
    );

    Ok(AppWiring {
        session: GameSession::new(config, save_dir),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
