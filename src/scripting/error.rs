use rhai::{EvalAltResult, Position, INT};
use thiserror::Error;

use crate::sprite::Uid;

/// Errors raised by the script bridge. All of them abort the current script
/// call and surface to the host; a missing UID is never one of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Invalid UID type: expected an integer or an integer range, got {0}.")]
    InvalidUidType(String),
    #[error("Invalid UID range {start}..={end}: the start must not exceed the end.")]
    InvalidUidRange { start: INT, end: INT },
    #[error("UID range {start}..={end} spans more than {limit} UIDs.")]
    UidRangeTooLong { start: INT, end: INT, limit: INT },
    #[error("Cannot create instances of {0}.")]
    ConstructionForbidden(&'static str),
    #[error("Invalid player type '{0}'.")]
    InvalidPlayerType(String),
    #[error("Cannot set the player type to 'dead', use kill() instead.")]
    DeadPlayerType,
    #[error("Sprite with UID {0} is no longer active.")]
    SpriteGone(Uid),
    #[error("The level of this script context has been unloaded.")]
    LevelUnloaded,
    #[error("The level is already borrowed by the simulation.")]
    LevelBusy,
}

impl From<BridgeError> for Box<EvalAltResult> {
    fn from(err: BridgeError) -> Self {
        EvalAltResult::ErrorRuntime(err.to_string().into(), Position::NONE).into()
    }
}
