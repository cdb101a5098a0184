use glam::Vec2;

use crate::player::PlayerType;
use crate::scripting::sprites::{EatoObject, FurballObject, PowerupObject, SpriteObject};
use crate::scripting::{ObjectHandle, Wrapper};
use crate::sprite::{EnemyState, Sprite, SpriteCore};

pub const DEFAULT_EATO_KILL_POINTS: u32 = 150;
pub const DEFAULT_FURBALL_KILL_POINTS: u32 = 50;
pub const BOSS_FURBALL_KILL_POINTS: u32 = 2_500;

/// Static level scenery.
#[derive(Debug, Clone)]
pub struct Decoration {
    core: SpriteCore,
    pub image: String,
}

impl Decoration {
    pub fn new(position: Vec2, image: impl Into<String>) -> Self {
        Self { core: SpriteCore::at(position), image: image.into() }
    }
}

impl Sprite for Decoration {
    fn kind(&self) -> &'static str {
        "decoration"
    }

    fn core(&self) -> &SpriteCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SpriteCore {
        &mut self.core
    }

    fn create_script_object(&self, handle: ObjectHandle) -> Option<Wrapper> {
        Some(Wrapper::new(SpriteObject::new(handle)))
    }
}

#[derive(Debug, Clone)]
pub struct Eato {
    core: SpriteCore,
    enemy: EnemyState,
}

impl Eato {
    pub fn new(position: Vec2) -> Self {
        Self::with_kill_points(position, DEFAULT_EATO_KILL_POINTS)
    }

    pub fn with_kill_points(position: Vec2, kill_points: u32) -> Self {
        Self { core: SpriteCore::at(position), enemy: EnemyState { kill_points, boss: false } }
    }
}

impl Sprite for Eato {
    fn kind(&self) -> &'static str {
        "eato"
    }

    fn core(&self) -> &SpriteCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SpriteCore {
        &mut self.core
    }

    fn create_script_object(&self, handle: ObjectHandle) -> Option<Wrapper> {
        Some(Wrapper::new(EatoObject::new(handle)))
    }

    fn enemy(&self) -> Option<&EnemyState> {
        Some(&self.enemy)
    }
}

#[derive(Debug, Clone)]
pub struct Furball {
    core: SpriteCore,
    enemy: EnemyState,
}

impl Furball {
    pub fn new(position: Vec2, boss: bool) -> Self {
        let kill_points = if boss { BOSS_FURBALL_KILL_POINTS } else { DEFAULT_FURBALL_KILL_POINTS };
        Self { core: SpriteCore::at(position), enemy: EnemyState { kill_points, boss } }
    }
}

impl Sprite for Furball {
    fn kind(&self) -> &'static str {
        "furball"
    }

    fn core(&self) -> &SpriteCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SpriteCore {
        &mut self.core
    }

    fn create_script_object(&self, handle: ObjectHandle) -> Option<Wrapper> {
        Some(Wrapper::new(FurballObject::new(handle)))
    }

    fn enemy(&self) -> Option<&EnemyState> {
        Some(&self.enemy)
    }
}

/// Collectible that changes the player's type.
#[derive(Debug, Clone)]
pub struct Mushroom {
    core: SpriteCore,
    grants: PlayerType,
}

impl Mushroom {
    pub fn new(position: Vec2, grants: PlayerType) -> Self {
        Self { core: SpriteCore::at(position), grants }
    }
}

impl Sprite for Mushroom {
    fn kind(&self) -> &'static str {
        "mushroom"
    }

    fn core(&self) -> &SpriteCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SpriteCore {
        &mut self.core
    }

    fn create_script_object(&self, handle: ObjectHandle) -> Option<Wrapper> {
        Some(Wrapper::new(PowerupObject::new(handle)))
    }

    fn powerup(&self) -> Option<PlayerType> {
        Some(self.grants)
    }
}

/// Purely visual emitter. Occupies a UID but is never handed to scripts.
#[derive(Debug, Clone)]
pub struct ParticleEmitter {
    core: SpriteCore,
    pub rate: f32,
}

impl ParticleEmitter {
    pub fn new(position: Vec2, rate: f32) -> Self {
        Self { core: SpriteCore::at(position), rate }
    }
}

impl Sprite for ParticleEmitter {
    fn kind(&self) -> &'static str {
        "particle_emitter"
    }

    fn core(&self) -> &SpriteCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SpriteCore {
        &mut self.core
    }

    fn create_script_object(&self, _handle: ObjectHandle) -> Option<Wrapper> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boss_furballs_are_worth_more() {
        let regular = Furball::new(Vec2::ZERO, false);
        let boss = Furball::new(Vec2::ZERO, true);
        assert_eq!(regular.enemy().map(|e| e.kill_points), Some(DEFAULT_FURBALL_KILL_POINTS));
        assert_eq!(boss.enemy().map(|e| e.kill_points), Some(BOSS_FURBALL_KILL_POINTS));
        assert_eq!(boss.enemy().map(|e| e.boss), Some(true));
        assert_eq!(Eato::new(Vec2::ZERO).enemy().map(|e| e.boss), Some(false));
    }

    #[test]
    fn only_mushrooms_grant_player_types() {
        assert_eq!(Mushroom::new(Vec2::ZERO, PlayerType::Fire).powerup(), Some(PlayerType::Fire));
        assert_eq!(Eato::new(Vec2::ZERO).powerup(), None);
        assert!(Decoration::new(Vec2::ZERO, "tree.png").enemy().is_none());
    }
}
