use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sprite::Uid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerType {
    Dead,
    #[default]
    Small,
    Big,
    Fire,
    Ice,
    Ghost,
}

impl PlayerType {
    pub fn name(self) -> &'static str {
        match self {
            PlayerType::Dead => "dead",
            PlayerType::Small => "small",
            PlayerType::Big => "big",
            PlayerType::Fire => "fire",
            PlayerType::Ice => "ice",
            PlayerType::Ghost => "ghost",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dead" => Some(PlayerType::Dead),
            "small" => Some(PlayerType::Small),
            "big" => Some(PlayerType::Big),
            "fire" => Some(PlayerType::Fire),
            "ice" => Some(PlayerType::Ice),
            "ghost" => Some(PlayerType::Ghost),
            _ => None,
        }
    }

    pub fn is_alive(self) -> bool {
        self != PlayerType::Dead
    }
}

impl fmt::Display for PlayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The level's player singleton. Always addressed as UID 0.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlayer {
    kind: PlayerType,
    position: Vec2,
    collisions: Vec<Uid>,
}

impl LevelPlayer {
    pub fn new(position: Vec2, kind: PlayerType) -> Self {
        Self { kind, position, collisions: Vec::new() }
    }

    pub fn kind(&self) -> PlayerType {
        self.kind
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn collisions(&self) -> &[Uid] {
        &self.collisions
    }

    pub fn add_collision(&mut self, uid: Uid) {
        if !self.collisions.contains(&uid) {
            self.collisions.push(uid);
        }
    }

    /// Hurts the player. A small player dies; `force` kills regardless of type.
    pub fn downgrade(&mut self, force: bool) -> PlayerType {
        self.kind = match self.kind {
            _ if force => PlayerType::Dead,
            PlayerType::Dead | PlayerType::Small => PlayerType::Dead,
            PlayerType::Big | PlayerType::Fire | PlayerType::Ice | PlayerType::Ghost => PlayerType::Small,
        };
        self.kind
    }

    pub fn set_kind(&mut self, kind: PlayerType) {
        self.kind = kind;
    }

    /// Teleports without validating the destination and drops pending collisions.
    pub fn warp(&mut self, position: Vec2) {
        self.position = position;
        self.collisions.clear();
    }
}

impl Default for LevelPlayer {
    fn default() -> Self {
        Self::new(Vec2::ZERO, PlayerType::Small)
    }
}
