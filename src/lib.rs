pub mod cli;
pub mod config;
pub mod events;
pub mod input;
pub mod level;
pub mod objects;
pub mod player;
pub mod script_harness;
pub mod scripting;
pub mod session;
pub mod sprite;
pub mod sprite_manager;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::CliOverrides;
use crate::config::AppConfig;
use crate::session::Session;

/// Loads the configured level, runs its script, replays the requested key
/// presses and unloads again.
pub fn run_with_overrides(cli: &CliOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default(cli.config_path());
    let overrides = cli.to_config_overrides();
    if !overrides.is_empty() {
        info!(fields = ?overrides.applied_fields(), "config_overrides_applied");
    }
    config.apply_overrides(&overrides);
    run_session(&config, cli.presses())
}

fn run_session(config: &AppConfig, presses: &[input::InputKey]) -> Result<()> {
    let mut session = Session::start(config)?;
    for key in presses {
        session.tick()?;
        if let Err(err) = session.press(*key) {
            warn!(key = key.name(), error = %err, "key_press_failed");
        }
        for event in session.drain_events() {
            info!(%event, "level_event");
        }
    }
    let cached = session.host().uids().map_or(0, |table| table.cache_size());
    info!(cached, "session_finished");
    for event in session.unload() {
        info!(%event, "level_event");
    }
    Ok(())
}
