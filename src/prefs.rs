//! Front-end preferences - typed key/value store persisted to sled
//!
//! Holds the values the front-end owns itself (selected GPU driver, driver
//! channel, haptic feedback, input bindings). Engine settings are not stored
//! here; they live behind the native bridge.

mod bindings;
mod store;
mod types;

pub use bindings::{InputBindings, PadButton};
pub use store::{Preferences, PrefsError};
pub use types::{keys, PrefValue};
