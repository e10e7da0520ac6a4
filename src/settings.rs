//! Engine settings tree
//!
//! The engine publishes its settings as a nested JSON document. Containers are
//! plain objects; leaves are objects carrying a `"type"` field (bool, enum,
//! int/uint, float). Every edit goes through the native bridge and the local
//! copy is only updated once the engine accepted the value.

mod node;
mod path;
mod tree;


pub use node::{SettingLeaf, SettingNode, SettingValue};
pub use path::{SettingPath, PATH_SEPARATOR};
pub use tree::SettingsTree;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("the engine did not provide a settings snapshot")]
    SnapshotUnavailable,
    #[error("invalid settings document: {0}")]
    InvalidDocument(String),
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("setting not found: {0}")]
    NotFound(String),
    #[error("{0} is a group, not a setting")]
    NotALeaf(String),
    #[error("{0} is a setting, not a group")]
    NotAGroup(String),
    #[error("{0} cannot be edited")]
    NotEditable(String),
    #[error("{path} expects a {expected} value, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{path}: {value} is outside [{min}, {max}]")]
    OutOfRange {
        path: String,
        value: String,
        min: String,
        max: String,
    },
    #[error("{path}: '{value}' is not one of {variants:?}")]
    UnknownVariant {
        path: String,
        value: String,
        variants: Vec<String>,
    },
    #[error("{path}: cannot parse '{raw}' as {expected}")]
    InvalidValue {
        path: String,
        raw: String,
        expected: &'static str,
    },
    /// The engine refused the write; the local value is unchanged
    #[error("{0}")]
    Rejected(String),
}
