use glam::Vec2;
use rhai::{Engine, EvalAltResult, FLOAT, INT};

use crate::scripting::error::BridgeError;
use crate::scripting::handle::{ObjectHandle, ScriptObject};

macro_rules! script_object {
    ($(#[$meta:meta])* $name:ident, $class:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name(ObjectHandle);

        impl $name {
            pub fn new(handle: ObjectHandle) -> Self {
                Self(handle)
            }
        }

        impl ScriptObject for $name {
            const CLASS: &'static str = $class;

            fn handle(&self) -> &ObjectHandle {
                &self.0
            }
        }
    };
}

script_object!(
    /// Plain sprite without variant specific behaviour.
    SpriteObject,
    "Sprite"
);
script_object!(EatoObject, "Eato");
script_object!(FurballObject, "Furball");
script_object!(PowerupObject, "Powerup");

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

pub fn register(engine: &mut Engine) {
    register_sprite_api::<SpriteObject>(engine);

    register_sprite_api::<EatoObject>(engine);
    register_enemy_api::<EatoObject>(engine);

    register_sprite_api::<FurballObject>(engine);
    register_enemy_api::<FurballObject>(engine);
    engine.register_get("boss", |obj: &mut FurballObject| -> ScriptResult<bool> {
        Ok(obj.handle().with_sprite(|sprite| sprite.enemy().map_or(false, |enemy| enemy.boss))?)
    });

    register_sprite_api::<PowerupObject>(engine);
    engine.register_get("grants", |obj: &mut PowerupObject| -> ScriptResult<String> {
        let uid = obj.handle().uid();
        let grants = obj.handle().with_sprite(|sprite| sprite.powerup())?.ok_or(BridgeError::SpriteGone(uid))?;
        Ok(grants.name().to_string())
    });
    engine.register_fn("activate", |obj: &mut PowerupObject| -> ScriptResult<()> {
        let uid = obj.handle().attached_uid()?;
        let applied = obj.handle().with_level_mut(|level| {
            let grants = level.sprites.get(uid).and_then(|sprite| sprite.powerup());
            grants.map(|grants| {
                level.set_player_type(grants);
                level.remove_sprite(uid);
            })
        })?;
        applied.ok_or_else(|| BridgeError::SpriteGone(uid).into())
    });
}

/// Identity, printing and comparison shared by every script object, player included.
pub(crate) fn register_identity<T: ScriptObject>(engine: &mut Engine) {
    engine
        .register_type_with_name::<T>(T::CLASS)
        .register_get("uid", |obj: &mut T| obj.handle().uid().to_script())
        .register_get("alive", |obj: &mut T| obj.handle().is_alive())
        .register_fn("==", |a: &mut T, b: T| a.handle().ptr_eq(b.handle()))
        .register_fn("!=", |a: &mut T, b: T| !a.handle().ptr_eq(b.handle()))
        .register_fn("to_string", |obj: &mut T| describe(obj))
        .register_fn("to_debug", |obj: &mut T| describe(obj));
}

fn describe<T: ScriptObject>(obj: &T) -> String {
    format!("#<{} uid={}>", T::CLASS, obj.handle().uid())
}

fn register_sprite_api<T: ScriptObject>(engine: &mut Engine) {
    register_identity::<T>(engine);
    engine
        .register_get("kind", |obj: &mut T| -> ScriptResult<String> {
            Ok(obj.handle().with_sprite(|sprite| sprite.kind().to_string())?)
        })
        .register_get("x", |obj: &mut T| -> ScriptResult<FLOAT> {
            Ok(obj.handle().with_sprite(|sprite| FLOAT::from(sprite.position().x))?)
        })
        .register_get("y", |obj: &mut T| -> ScriptResult<FLOAT> {
            Ok(obj.handle().with_sprite(|sprite| FLOAT::from(sprite.position().y))?)
        })
        .register_fn("warp", |obj: &mut T, x: FLOAT, y: FLOAT| -> ScriptResult<()> {
            Ok(obj.handle().with_sprite_mut(|sprite| sprite.set_position(Vec2::new(x as f32, y as f32)))?)
        })
        .register_fn("warp", |obj: &mut T, x: INT, y: INT| -> ScriptResult<()> {
            Ok(obj.handle().with_sprite_mut(|sprite| sprite.set_position(Vec2::new(x as f32, y as f32)))?)
        });
}

fn register_enemy_api<T: ScriptObject>(engine: &mut Engine) {
    engine
        .register_get("kill_points", |obj: &mut T| -> ScriptResult<INT> {
            let uid = obj.handle().uid();
            let points = obj
                .handle()
                .with_sprite(|sprite| sprite.enemy().map(|enemy| enemy.kill_points))?
                .ok_or(BridgeError::SpriteGone(uid))?;
            Ok(INT::from(points))
        })
        .register_fn("kill", |obj: &mut T| -> ScriptResult<()> {
            let uid = obj.handle().attached_uid()?;
            let removed = obj.handle().with_level_mut(|level| level.remove_sprite(uid))?;
            match removed {
                Some(_) => Ok(()),
                None => Err(BridgeError::SpriteGone(uid).into()),
            }
        });
}
