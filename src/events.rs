use std::fmt;

use crate::player::PlayerType;
use crate::sprite::Uid;

#[derive(Debug, Clone, PartialEq)]
pub enum LevelEvent {
    SpriteAdded { uid: Uid, kind: &'static str },
    SpriteRemoved { uid: Uid, kind: &'static str },
    PlayerTypeChanged { from: PlayerType, to: PlayerType },
    PlayerWarped { x: f32, y: f32 },
    KeyDown { key: String },
    LevelUnloaded { name: String },
}

impl fmt::Display for LevelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelEvent::SpriteAdded { uid, kind } => write!(f, "SpriteAdded uid={uid} kind={kind}"),
            LevelEvent::SpriteRemoved { uid, kind } => write!(f, "SpriteRemoved uid={uid} kind={kind}"),
            LevelEvent::PlayerTypeChanged { from, to } => write!(f, "PlayerTypeChanged from={from} to={to}"),
            LevelEvent::PlayerWarped { x, y } => write!(f, "PlayerWarped x={x:.1} y={y:.1}"),
            LevelEvent::KeyDown { key } => write!(f, "KeyDown key={key}"),
            LevelEvent::LevelUnloaded { name } => write!(f, "LevelUnloaded name={name}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<LevelEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: LevelEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<LevelEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
