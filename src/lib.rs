//! emuctl - GPU driver registry and settings synchronization for the emulator front-end
//!
//! The crate is organised around the native engine boundary ([`bridge::NativeBridge`]):
//! driver packages are installed and selected through [`drivers::DriverRegistry`],
//! engine settings are edited through [`settings::SettingsTree`], and front-end
//! preferences live in the sled-backed [`prefs::Preferences`] store.

pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod library;
pub mod paths;
pub mod prefs;
pub mod settings;

pub use app::App;
