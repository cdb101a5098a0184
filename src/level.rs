use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fs;
use std::path::Path;
use std::rc::{Rc, Weak};

use anyhow::{Context, Result};
use glam::Vec2;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::events::{EventBus, LevelEvent};
use crate::objects::{Decoration, Eato, Furball, Mushroom, ParticleEmitter};
use crate::player::{LevelPlayer, PlayerType};
use crate::sprite::{Sprite, Uid};
use crate::sprite_manager::{LevelError, SpriteManager, UidPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDescription {
    #[serde(default = "LevelDescription::default_name")]
    pub name: String,
    #[serde(default)]
    pub player: PlayerDescription,
    #[serde(default)]
    pub sprites: Vec<SpriteDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerDescription {
    #[serde(default)]
    pub position: [f32; 2],
    #[serde(default)]
    pub kind: PlayerType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    pub position: [f32; 2],
    #[serde(flatten)]
    pub kind: SpriteKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpriteKind {
    Decoration {
        #[serde(default)]
        image: String,
    },
    Eato {
        #[serde(default)]
        kill_points: Option<u32>,
    },
    Furball {
        #[serde(default)]
        boss: bool,
    },
    Mushroom {
        #[serde(default = "SpriteKind::default_grants", deserialize_with = "SpriteKind::grants_from_json")]
        grants: PlayerType,
    },
    ParticleEmitter {
        #[serde(default = "SpriteKind::default_rate")]
        rate: f32,
    },
}

impl SpriteKind {
    fn default_grants() -> PlayerType {
        PlayerType::Big
    }

    /// `dead` is only reachable through `kill()`, never through a powerup.
    fn grants_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PlayerType, D::Error> {
        match PlayerType::deserialize(deserializer)? {
            PlayerType::Dead => Err(serde::de::Error::custom("a mushroom cannot grant the 'dead' player type")),
            kind => Ok(kind),
        }
    }

    fn default_rate() -> f32 {
        8.0
    }
}

impl SpriteDescription {
    pub fn build(&self) -> Box<dyn Sprite> {
        let position = Vec2::from(self.position);
        match &self.kind {
            SpriteKind::Decoration { image } => Box::new(Decoration::new(position, image.clone())),
            SpriteKind::Eato { kill_points: Some(points) } => Box::new(Eato::with_kill_points(position, *points)),
            SpriteKind::Eato { kill_points: None } => Box::new(Eato::new(position)),
            SpriteKind::Furball { boss } => Box::new(Furball::new(position, *boss)),
            SpriteKind::Mushroom { grants } => Box::new(Mushroom::new(position, *grants)),
            SpriteKind::ParticleEmitter { rate } => Box::new(ParticleEmitter::new(position, *rate)),
        }
    }
}

impl LevelDescription {
    fn default_name() -> String {
        "untitled".to_string()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read level file {}", path.display()))?;
        let level = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse level file {}", path.display()))?;
        Ok(level)
    }
}

/// One loaded simulation instance: its sprites, the player and pending events.
pub struct Level {
    name: String,
    pub sprites: SpriteManager,
    pub player: LevelPlayer,
    events: EventBus,
}

impl Level {
    pub fn new(name: impl Into<String>, policy: UidPolicy) -> Self {
        Self {
            name: name.into(),
            sprites: SpriteManager::new(policy),
            player: LevelPlayer::default(),
            events: EventBus::default(),
        }
    }

    pub fn from_description(desc: &LevelDescription, policy: UidPolicy) -> Result<Self> {
        let mut level = Level::new(desc.name.clone(), policy);
        level.player = LevelPlayer::new(Vec2::from(desc.player.position), desc.player.kind);
        for (idx, sprite) in desc.sprites.iter().enumerate() {
            level
                .spawn_with_uid(sprite.uid, sprite.build())
                .with_context(|| format!("Sprite #{idx} in level '{}'", desc.name))?;
        }
        // Load-time additions are not interesting to listeners.
        level.events.drain();
        info!(level = %level.name, sprites = level.sprites.len(), "level_loaded");
        Ok(level)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spawn(&mut self, sprite: Box<dyn Sprite>) -> Result<Uid, LevelError> {
        self.spawn_with_uid(None, sprite)
    }

    pub fn spawn_with_uid(&mut self, uid: Option<Uid>, sprite: Box<dyn Sprite>) -> Result<Uid, LevelError> {
        let kind = sprite.kind();
        let uid = self.sprites.insert(uid, sprite)?;
        self.events.push(LevelEvent::SpriteAdded { uid, kind });
        Ok(uid)
    }

    pub fn remove_sprite(&mut self, uid: Uid) -> Option<Box<dyn Sprite>> {
        let sprite = self.sprites.remove(uid)?;
        self.events.push(LevelEvent::SpriteRemoved { uid, kind: sprite.kind() });
        Some(sprite)
    }

    pub fn downgrade_player(&mut self, force: bool) -> PlayerType {
        let from = self.player.kind();
        let to = self.player.downgrade(force);
        self.record_type_change(from, to);
        to
    }

    pub fn set_player_type(&mut self, kind: PlayerType) {
        let from = self.player.kind();
        self.player.set_kind(kind);
        self.record_type_change(from, kind);
    }

    fn record_type_change(&mut self, from: PlayerType, to: PlayerType) {
        if from != to {
            self.events.push(LevelEvent::PlayerTypeChanged { from, to });
        }
    }

    pub fn warp_player(&mut self, position: Vec2) {
        self.player.warp(position);
        self.events.push(LevelEvent::PlayerWarped { x: position.x, y: position.y });
    }

    pub fn push_event(&mut self, event: LevelEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<LevelEvent> {
        self.events.drain()
    }

    /// Tears the level down. Every active sprite is removed with notification.
    pub fn unload(&mut self) {
        for (uid, kind) in self.sprites.clear() {
            self.events.push(LevelEvent::SpriteRemoved { uid, kind });
        }
        self.events.push(LevelEvent::LevelUnloaded { name: self.name.clone() });
        info!(level = %self.name, "level_unloaded");
    }
}

/// Owning handle held by the simulation.
#[derive(Clone)]
pub struct LevelHandle(Rc<RefCell<Level>>);

impl LevelHandle {
    pub fn new(level: Level) -> Self {
        Self(Rc::new(RefCell::new(level)))
    }

    pub fn borrow(&self) -> Ref<'_, Level> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Level> {
        self.0.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, Level>, BorrowError> {
        self.0.try_borrow()
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, Level>, BorrowMutError> {
        self.0.try_borrow_mut()
    }

    pub fn downgrade(&self) -> WeakLevel {
        WeakLevel(Rc::downgrade(&self.0))
    }
}

/// Non-owning level reference used by everything on the script side.
#[derive(Clone, Default)]
pub struct WeakLevel(Weak<RefCell<Level>>);

impl WeakLevel {
    pub fn upgrade(&self) -> Option<LevelHandle> {
        self.0.upgrade().map(LevelHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL_JSON: &str = r#"{
        "name": "lvl_1",
        "player": { "position": [10.0, 20.0], "kind": "big" },
        "sprites": [
            { "uid": 4, "kind": "eato", "position": [100.0, 0.0] },
            { "kind": "furball", "position": [140.0, 0.0], "boss": true },
            { "kind": "mushroom", "position": [180.0, -32.0], "grants": "fire" },
            { "kind": "particle_emitter", "position": [0.0, 0.0] },
            { "uid": 2, "kind": "decoration", "position": [0.0, 64.0], "image": "hill.png" }
        ]
    }"#;

    #[test]
    fn description_builds_level_with_explicit_and_allocated_uids() {
        let desc: LevelDescription = serde_json::from_str(LEVEL_JSON).expect("parse level");
        let level = Level::from_description(&desc, UidPolicy::Monotonic).expect("build level");
        assert_eq!(level.name(), "lvl_1");
        assert_eq!(level.player.kind(), PlayerType::Big);
        assert_eq!(level.sprites.uids(), vec![Uid::new(4), Uid::new(5), Uid::new(6), Uid::new(7), Uid::new(2)]);
        assert_eq!(level.sprites.get(Uid::new(6)).and_then(|s| s.powerup()), Some(PlayerType::Fire));
        assert_eq!(level.sprites.get(Uid::new(5)).and_then(|s| s.enemy()).map(|e| e.kill_points), Some(2_500));
    }

    #[test]
    fn duplicate_uid_in_description_is_rejected() {
        let desc = LevelDescription {
            name: "dupes".into(),
            player: PlayerDescription::default(),
            sprites: vec![
                SpriteDescription {
                    uid: Some(Uid::new(3)),
                    position: [0.0, 0.0],
                    kind: SpriteKind::Furball { boss: false },
                },
                SpriteDescription {
                    uid: Some(Uid::new(3)),
                    position: [0.0, 0.0],
                    kind: SpriteKind::Furball { boss: false },
                },
            ],
        };
        let err = Level::from_description(&desc, UidPolicy::Monotonic).err().expect("duplicate uid should fail");
        assert!(format!("{err:#}").contains("already used"), "unexpected error: {err:#}");
    }

    #[test]
    fn mushroom_granting_dead_is_rejected() {
        let json = r#"{ "sprites": [ { "kind": "mushroom", "position": [0.0, 0.0], "grants": "dead" } ] }"#;
        let err = serde_json::from_str::<LevelDescription>(json).err().expect("dead grant should fail");
        assert!(err.to_string().contains("cannot grant the 'dead'"), "unexpected error: {err}");

        let json = r#"{ "sprites": [ { "kind": "mushroom", "position": [0.0, 0.0] } ] }"#;
        let desc: LevelDescription = serde_json::from_str(json).expect("default grant");
        assert_eq!(desc.sprites[0].kind, SpriteKind::Mushroom { grants: PlayerType::Big });
    }

    #[test]
    fn unload_removes_everything_and_records_events() {
        let desc: LevelDescription = serde_json::from_str(LEVEL_JSON).expect("parse level");
        let mut level = Level::from_description(&desc, UidPolicy::Monotonic).expect("build level");
        level.unload();
        assert!(level.sprites.is_empty());
        let events = level.drain_events();
        assert_eq!(events.len(), 6);
        assert_eq!(events.last(), Some(&LevelEvent::LevelUnloaded { name: "lvl_1".into() }));
    }

    #[test]
    fn player_changes_are_recorded_once() {
        let mut level = Level::new("events", UidPolicy::Monotonic);
        level.set_player_type(PlayerType::Small);
        level.set_player_type(PlayerType::Ghost);
        level.downgrade_player(true);
        let events = level.drain_events();
        assert_eq!(
            events,
            vec![
                LevelEvent::PlayerTypeChanged { from: PlayerType::Small, to: PlayerType::Ghost },
                LevelEvent::PlayerTypeChanged { from: PlayerType::Ghost, to: PlayerType::Dead },
            ]
        );
    }
}
