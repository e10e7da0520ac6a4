//! Controller input bindings (host key code -> emulated pad button)

use super::store::{Preferences, PrefsError};
use super::types::keys;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// Buttons of the emulated controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadButton {
    Cross,
    Circle,
    Square,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    L3,
    R3,
    Start,
    Select,
    Up,
    Down,
    Left,
    Right,
}

impl PadButton {
    pub fn all() -> &'static [PadButton] {
        &[
            PadButton::Cross,
            PadButton::Circle,
            PadButton::Square,
            PadButton::Triangle,
            PadButton::L1,
            PadButton::R1,
            PadButton::L2,
            PadButton::R2,
            PadButton::L3,
            PadButton::R3,
            PadButton::Start,
            PadButton::Select,
            PadButton::Up,
            PadButton::Down,
            PadButton::Left,
            PadButton::Right,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PadButton::Cross => "cross",
            PadButton::Circle => "circle",
            PadButton::Square => "square",
            PadButton::Triangle => "triangle",
            PadButton::L1 => "l1",
            PadButton::R1 => "r1",
            PadButton::L2 => "l2",
            PadButton::R2 => "r2",
            PadButton::L3 => "l3",
            PadButton::R3 => "r3",
            PadButton::Start => "start",
            PadButton::Select => "select",
            PadButton::Up => "up",
            PadButton::Down => "down",
            PadButton::Left => "left",
            PadButton::Right => "right",
        }
    }
}

impl std::fmt::Display for PadButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PadButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        PadButton::all()
            .iter()
            .copied()
            .find(|b| b.as_str() == lower)
            .ok_or_else(|| format!("unknown pad button '{}'", s))
    }
}

/// Host key code -> pad button map
///
/// A pad button is bound to at most one host key at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBindings {
    map: BTreeMap<i32, PadButton>,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl InputBindings {
    /// Default layout for a standard gamepad (Android key codes)
    pub fn defaults() -> Self {
        let map = [
            (96, PadButton::Cross),     // BUTTON_A
            (97, PadButton::Circle),    // BUTTON_B
            (99, PadButton::Square),    // BUTTON_X
            (100, PadButton::Triangle), // BUTTON_Y
            (102, PadButton::L1),
            (103, PadButton::R1),
            (104, PadButton::L2),
            (105, PadButton::R2),
            (106, PadButton::L3), // BUTTON_THUMBL
            (107, PadButton::R3), // BUTTON_THUMBR
            (108, PadButton::Start),
            (109, PadButton::Select),
            (19, PadButton::Up), // DPAD_UP
            (20, PadButton::Down),
            (21, PadButton::Left),
            (22, PadButton::Right),
        ]
        .into_iter()
        .collect();

        Self { map }
    }

    /// Load bindings from preferences, falling back to defaults when absent or unreadable
    pub fn load(prefs: &Preferences) -> Self {
        let raw = prefs.string(keys::INPUT_BINDINGS, "");
        if raw.is_empty() {
            return Self::defaults();
        }

        match serde_json::from_str::<BTreeMap<i32, PadButton>>(&raw) {
            Ok(map) => Self { map },
            Err(e) => {
                warn!("Stored input bindings are unreadable, using defaults: {}", e);
                Self::defaults()
            }
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), PrefsError> {
        let encoded = serde_json::to_string(&self.map)?;
        prefs.set_value(keys::INPUT_BINDINGS, encoded)
    }

    /// Bind `host_key` to `button`.
    ///
    /// Any other host key bound to `button` is released and returned.
    pub fn bind(&mut self, host_key: i32, button: PadButton) -> Option<i32> {
        let previous = self
            .map
            .iter()
            .find(|(k, b)| **b == button && **k != host_key)
            .map(|(k, _)| *k);

        if let Some(old) = previous {
            self.map.remove(&old);
        }
        self.map.insert(host_key, button);
        debug!("Bound key {} -> {} (released {:?})", host_key, button, previous);
        previous
    }

    pub fn unbind(&mut self, host_key: i32) -> Option<PadButton> {
        self.map.remove(&host_key)
    }

    pub fn button_for(&self, host_key: i32) -> Option<PadButton> {
        self.map.get(&host_key).copied()
    }

    pub fn key_for(&self, button: PadButton) -> Option<i32> {
        self.map.iter().find(|(_, b)| **b == button).map(|(k, _)| *k)
    }

    /// Whether `button` is bound to its default host key
    pub fn is_default(&self, button: PadButton) -> bool {
        self.key_for(button) == Self::defaults().key_for(button)
    }

    pub fn reset(&mut self) {
        *self = Self::defaults();
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, PadButton)> + '_ {
        self.map.iter().map(|(k, b)| (*k, *b))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
