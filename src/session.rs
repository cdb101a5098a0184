use anyhow::{anyhow, Result};
use tracing::{debug, info};

use crate::config::{AppConfig, ScriptConfig};
use crate::events::LevelEvent;
use crate::input::InputKey;
use crate::level::{Level, LevelDescription, LevelHandle};
use crate::sprite::{Sprite, Uid};
use crate::sprite_manager::UidPolicy;
use crate::scripting::ScriptHost;

/// A headless run: one loaded level with its script host attached.
pub struct Session {
    level: LevelHandle,
    host: ScriptHost,
    hot_reload: bool,
}

impl Session {
    pub fn start(config: &AppConfig) -> Result<Self> {
        let desc = LevelDescription::load(&config.level.path)?;
        Self::from_description(&desc, config.level.uid_policy, &config.script)
    }

    pub fn from_description(desc: &LevelDescription, policy: UidPolicy, script: &ScriptConfig) -> Result<Self> {
        let level = LevelHandle::new(Level::from_description(desc, policy)?);
        let mut host = ScriptHost::new(&script.main_script, script);
        host.attach_level(&level)?;
        Ok(Self { level, host, hot_reload: script.hot_reload })
    }

    pub fn level(&self) -> &LevelHandle {
        &self.level
    }

    pub fn host(&self) -> &ScriptHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut ScriptHost {
        &mut self.host
    }

    /// Picks up script edits when hot reload is enabled.
    pub fn tick(&mut self) -> Result<bool> {
        if !self.hot_reload {
            return Ok(false);
        }
        let reloaded = self.host.reload_if_needed()?;
        if reloaded {
            info!(script = %self.host.script_path().display(), "script_reloaded");
        }
        Ok(reloaded)
    }

    pub fn press(&mut self, key: InputKey) -> Result<()> {
        debug!(key = key.name(), "key_down");
        self.host.key_down(key).map_err(|err| anyhow!("key_down({key}) handler failed: {err}"))
    }

    pub fn spawn(&mut self, sprite: Box<dyn Sprite>) -> Result<Uid> {
        Ok(self.level.borrow_mut().spawn(sprite)?)
    }

    pub fn remove_sprite(&mut self, uid: Uid) -> bool {
        self.level.borrow_mut().remove_sprite(uid).is_some()
    }

    pub fn drain_events(&mut self) -> Vec<LevelEvent> {
        self.level.borrow_mut().drain_events()
    }

    /// Unloads the level and drops its script context, returning the final events.
    pub fn unload(mut self) -> Vec<LevelEvent> {
        self.level.borrow_mut().unload();
        self.host.detach_level();
        self.drain_events()
    }
}
