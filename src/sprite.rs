use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::player::PlayerType;
use crate::scripting::{ObjectHandle, Wrapper};

/// Unique identifier of an active sprite. UID 0 always denotes the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(u32);

impl Uid {
    pub const PLAYER: Uid = Uid(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn is_player(self) -> bool {
        self == Self::PLAYER
    }

    /// Script integers outside the UID domain (negative or too large) map to `None`.
    pub fn from_script(raw: rhai::INT) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    pub fn to_script(self) -> rhai::INT {
        rhai::INT::from(self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpriteCore {
    pub position: Vec2,
}

impl SpriteCore {
    pub fn at(position: Vec2) -> Self {
        Self { position }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyState {
    pub kill_points: u32,
    pub boss: bool,
}

/// A native simulation object owned by the level's [`SpriteManager`](crate::sprite_manager::SpriteManager).
///
/// Each variant decides for itself how it is exposed to scripts through
/// [`Sprite::create_script_object`]; there is no central variant table.
pub trait Sprite: fmt::Debug {
    fn kind(&self) -> &'static str;

    fn core(&self) -> &SpriteCore;

    fn core_mut(&mut self) -> &mut SpriteCore;

    /// Builds the script-side object for this sprite, or `None` to stay
    /// invisible to scripts. `handle` is the only link the wrapper may keep.
    fn create_script_object(&self, handle: ObjectHandle) -> Option<Wrapper>;

    fn enemy(&self) -> Option<&EnemyState> {
        None
    }

    /// Player type granted when this sprite is collected.
    fn powerup(&self) -> Option<PlayerType> {
        None
    }

    fn position(&self) -> Vec2 {
        self.core().position
    }

    fn set_position(&mut self, position: Vec2) {
        self.core_mut().position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_integers_outside_uid_domain_are_rejected() {
        assert_eq!(Uid::from_script(-1), None);
        assert_eq!(Uid::from_script(rhai::INT::from(u32::MAX) + 1), None);
        assert_eq!(Uid::from_script(42), Some(Uid::new(42)));
        assert_eq!(Uid::new(42).to_script(), 42);
        assert!(Uid::from_script(0).map(Uid::is_player).unwrap_or(false));
    }
}
