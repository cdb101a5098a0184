use glam::Vec2;
use rhai::{Engine, EvalAltResult, FLOAT, INT};

use crate::player::PlayerType;
use crate::scripting::error::BridgeError;
use crate::scripting::handle::{ObjectHandle, ScriptObject};
use crate::scripting::sprites::register_identity;

/// The `Player` singleton. Every call forwards to the level's player.
#[derive(Clone, Debug)]
pub struct PlayerObject(ObjectHandle);

impl PlayerObject {
    pub fn new(handle: ObjectHandle) -> Self {
        Self(handle)
    }

    pub fn downgrade(&mut self) -> Result<(), Box<EvalAltResult>> {
        self.0.attached_uid()?;
        self.0.with_level_mut(|level| level.downgrade_player(false))?;
        Ok(())
    }

    pub fn kill(&mut self) -> Result<(), Box<EvalAltResult>> {
        self.0.attached_uid()?;
        self.0.with_level_mut(|level| level.downgrade_player(true))?;
        Ok(())
    }

    /// Rejects `dead` and unknown names before touching the level.
    pub fn set_type(&mut self, name: &str) -> Result<(), Box<EvalAltResult>> {
        let kind = match PlayerType::from_name(name) {
            Some(PlayerType::Dead) => return Err(BridgeError::DeadPlayerType.into()),
            Some(kind) => kind,
            None => return Err(BridgeError::InvalidPlayerType(name.to_string()).into()),
        };
        self.0.attached_uid()?;
        self.0.with_level_mut(|level| level.set_player_type(kind))?;
        Ok(())
    }

    pub fn warp(&mut self, x: FLOAT, y: FLOAT) -> Result<(), Box<EvalAltResult>> {
        self.0.attached_uid()?;
        self.0.with_level_mut(|level| level.warp_player(Vec2::new(x as f32, y as f32)))?;
        Ok(())
    }

    fn warp_int(&mut self, x: INT, y: INT) -> Result<(), Box<EvalAltResult>> {
        self.warp(x as FLOAT, y as FLOAT)
    }

    fn kind(&mut self) -> Result<String, Box<EvalAltResult>> {
        Ok(self.0.with_level(|level| level.player.kind().name().to_string())?)
    }

    fn x(&mut self) -> Result<FLOAT, Box<EvalAltResult>> {
        Ok(self.0.with_level(|level| FLOAT::from(level.player.position().x))?)
    }

    fn y(&mut self) -> Result<FLOAT, Box<EvalAltResult>> {
        Ok(self.0.with_level(|level| FLOAT::from(level.player.position().y))?)
    }
}

impl ScriptObject for PlayerObject {
    const CLASS: &'static str = "Player";

    fn handle(&self) -> &ObjectHandle {
        &self.0
    }
}

pub fn register(engine: &mut Engine) {
    register_identity::<PlayerObject>(engine);
    engine
        .register_fn("downgrade", PlayerObject::downgrade)
        .register_fn("kill", PlayerObject::kill)
        .register_fn("set_type", PlayerObject::set_type)
        .register_fn("warp", PlayerObject::warp)
        .register_fn("warp", PlayerObject::warp_int)
        .register_get("kind", PlayerObject::kind)
        .register_get("x", PlayerObject::x)
        .register_get("y", PlayerObject::y);
}
