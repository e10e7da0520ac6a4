//! Preference value types and well-known keys

use serde::{Deserialize, Serialize};

/// Well-known preference keys
pub mod keys {
    /// Label of the selected GPU driver ("Default" when none was chosen)
    pub const SELECTED_GPU_DRIVER: &str = "selected_gpu_driver";
    /// Repository URL of the driver channel used for downloads
    pub const GPU_DRIVER_CHANNEL: &str = "gpu_driver_channel";
    /// Native path of the selected driver package ("" for the system driver)
    pub const GPU_DRIVER_PATH: &str = "gpu_driver_path";
    /// Library file name of the selected driver package
    pub const GPU_DRIVER_NAME: &str = "gpu_driver_name";
    pub const HAPTIC_FEEDBACK: &str = "haptic_feedback";
    /// JSON-encoded host key -> pad button map
    pub const INPUT_BINDINGS: &str = "input_bindings";

    /// Value assumed for a well-known key that was never written
    pub fn default_for(key: &str) -> Option<super::PrefValue> {
        match key {
            SELECTED_GPU_DRIVER => Some(super::PrefValue::String("Default".to_string())),
            HAPTIC_FEEDBACK => Some(super::PrefValue::Bool(true)),
            _ => None,
        }
    }
}

/// A typed preference value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PrefValue {
    String(String),
    Int(i32),
    Bool(bool),
    Float(f32),
    Long(i64),
}

impl PrefValue {
    /// Name of the value type, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            PrefValue::String(_) => "string",
            PrefValue::Int(_) => "int",
            PrefValue::Bool(_) => "bool",
            PrefValue::Float(_) => "float",
            PrefValue::Long(_) => "long",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            PrefValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            PrefValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            PrefValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Parse a value from its CLI form `<type>:<value>` (e.g. `bool:true`, `int:3`).
    /// A bare value without a type prefix is stored as a string.
    pub fn parse_typed(input: &str) -> Result<Self, String> {
        let Some((kind, raw)) = input.split_once(':') else {
            return Ok(PrefValue::String(input.to_string()));
        };

        let bad = |e: &dyn std::fmt::Display| format!("invalid {} value '{}': {}", kind, raw, e);
        match kind {
            "string" => Ok(PrefValue::String(raw.to_string())),
            "int" => raw.parse().map(PrefValue::Int).map_err(|e| bad(&e)),
            "long" => raw.parse().map(PrefValue::Long).map_err(|e| bad(&e)),
            "float" => match raw.parse::<f32>() {
                Ok(value) if value.is_finite() => Ok(PrefValue::Float(value)),
                Ok(_) => Err(bad(&"not a finite number")),
                Err(e) => Err(bad(&e)),
            },
            "bool" => raw.parse().map(PrefValue::Bool).map_err(|e| bad(&e)),
            // Not a known type prefix (URLs contain ':'), keep the whole input
            _ => Ok(PrefValue::String(input.to_string())),
        }
    }
}

impl std::fmt::Display for PrefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefValue::String(s) => write!(f, "{}", s),
            PrefValue::Int(i) => write!(f, "{}", i),
            PrefValue::Bool(b) => write!(f, "{}", b),
            PrefValue::Float(v) => write!(f, "{}", v),
            PrefValue::Long(l) => write!(f, "{}", l),
        }
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        PrefValue::String(value.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        PrefValue::String(value)
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        PrefValue::Bool(value)
    }
}

impl From<i32> for PrefValue {
    fn from(value: i32) -> Self {
        PrefValue::Int(value)
    }
}

impl From<i64> for PrefValue {
    fn from(value: i64) -> Self {
        PrefValue::Long(value)
    }
}

impl From<f32> for PrefValue {
    fn from(value: f32) -> Self {
        PrefValue::Float(value)
    }
}
