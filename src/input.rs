use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Game-relevant inputs, keyboard or joystick. Scripts only ever see the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    Up,
    Down,
    Left,
    Right,
    Jump,
    Shoot,
    Action,
    ItemDrop,
    Exit,
}

impl InputKey {
    pub const ALL: [InputKey; 9] = [
        InputKey::Up,
        InputKey::Down,
        InputKey::Left,
        InputKey::Right,
        InputKey::Jump,
        InputKey::Shoot,
        InputKey::Action,
        InputKey::ItemDrop,
        InputKey::Exit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InputKey::Up => "up",
            InputKey::Down => "down",
            InputKey::Left => "left",
            InputKey::Right => "right",
            InputKey::Jump => "jump",
            InputKey::Shoot => "shoot",
            InputKey::Action => "action",
            InputKey::ItemDrop => "item_drop",
            InputKey::Exit => "exit",
        }
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        match InputKey::ALL.iter().find(|key| key.name() == lowered) {
            Some(key) => Ok(*key),
            None => bail!("Unknown input key '{s}'."),
        }
    }
}
