//! Settings document nodes and typed leaves

use super::path::SettingPath;
use super::SettingsError;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A value that can be written to a setting leaf
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Enum(String),
    Int(i64),
    Float(f64),
}

impl SettingValue {
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Enum(_) => "enum",
            SettingValue::Int(_) => "int",
            SettingValue::Float(_) => "float",
        }
    }

    /// JSON encoding passed to the engine (`true`, `"Vulkan"`, `100`, `0.5`)
    pub fn encode(&self) -> String {
        match self {
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Enum(s) => Value::String(s.clone()).to_string(),
            SettingValue::Int(i) => i.to_string(),
            SettingValue::Float(f) => f.to_string(),
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Enum(s) => write!(f, "{}", s),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A terminal, editable setting
#[derive(Debug, Clone, PartialEq)]
pub enum SettingLeaf {
    Bool {
        value: bool,
        default: bool,
    },
    Enum {
        value: String,
        default: String,
        variants: Vec<String>,
    },
    /// `int` and `uint` document types
    Int {
        value: i64,
        default: i64,
        min: i64,
        max: i64,
        unsigned: bool,
    },
    Float {
        value: f64,
        default: f64,
        min: f64,
        max: f64,
    },
    /// Type this front-end does not know how to edit
    Unsupported { type_name: String },
}

fn read_bool(obj: &Map<String, Value>, field: &str) -> Option<bool> {
    match obj.get(field)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field)?.as_str().map(str::to_string)
}

fn read_i64(obj: &Map<String, Value>, field: &str) -> Option<i64> {
    match obj.get(field)? {
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .ok()
            .map(|v| v.clamp(i64::MIN as i128, i64::MAX as i128) as i64),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u.min(i64::MAX as u64) as i64)),
        _ => None,
    }
}

fn read_f64(obj: &Map<String, Value>, field: &str) -> Option<f64> {
    match obj.get(field)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Numeric fields fall back to zero when missing or malformed
fn numeric_or_zero<T: Default>(path: &SettingPath, field: &str, value: Option<T>) -> T {
    value.unwrap_or_else(|| {
        warn!("Setting {} has no usable '{}', using 0", path, field);
        T::default()
    })
}

impl SettingLeaf {
    /// Build a leaf from its document object (which carries a string `"type"`)
    pub fn from_object(
        type_name: &str,
        obj: &Map<String, Value>,
        path: &SettingPath,
    ) -> Result<Self, String> {
        match type_name {
            "bool" => {
                let value = read_bool(obj, "value").ok_or("missing boolean 'value'")?;
                let default = read_bool(obj, "default").unwrap_or(value);
                Ok(SettingLeaf::Bool { value, default })
            }
            "enum" => {
                let value = read_string(obj, "value").ok_or("missing string 'value'")?;
                let default = read_string(obj, "default").unwrap_or_else(|| value.clone());
                let variants = obj
                    .get("variants")
                    .and_then(Value::as_array)
                    .ok_or("missing 'variants' array")?
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                Ok(SettingLeaf::Enum {
                    value,
                    default,
                    variants,
                })
            }
            "int" | "uint" => Ok(SettingLeaf::Int {
                value: numeric_or_zero(path, "value", read_i64(obj, "value")),
                default: numeric_or_zero(path, "default", read_i64(obj, "default")),
                min: numeric_or_zero(path, "min", read_i64(obj, "min")),
                max: numeric_or_zero(path, "max", read_i64(obj, "max")),
                unsigned: type_name == "uint",
            }),
            "float" => Ok(SettingLeaf::Float {
                value: numeric_or_zero(path, "value", read_f64(obj, "value")),
                default: read_f64(obj, "default").unwrap_or(0.0),
                min: read_f64(obj, "min").unwrap_or(0.0),
                max: read_f64(obj, "max").unwrap_or(0.0),
            }),
            other => Ok(SettingLeaf::Unsupported {
                type_name: other.to_string(),
            }),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            SettingLeaf::Bool { .. } => "bool",
            SettingLeaf::Enum { .. } => "enum",
            SettingLeaf::Int { unsigned: true, .. } => "uint",
            SettingLeaf::Int { .. } => "int",
            SettingLeaf::Float { .. } => "float",
            SettingLeaf::Unsupported { type_name } => type_name,
        }
    }

    /// Current value as displayed.
    ///
    /// An enum whose stored value is not one of its variants shows the first variant.
    pub fn value(&self) -> Option<SettingValue> {
        match self {
            SettingLeaf::Bool { value, .. } => Some(SettingValue::Bool(*value)),
            SettingLeaf::Enum {
                value, variants, ..
            } => {
                let shown = if variants.contains(value) || variants.is_empty() {
                    value.clone()
                } else {
                    variants[0].clone()
                };
                Some(SettingValue::Enum(shown))
            }
            SettingLeaf::Int { value, .. } => Some(SettingValue::Int(*value)),
            SettingLeaf::Float { value, .. } => Some(SettingValue::Float(*value)),
            SettingLeaf::Unsupported { .. } => None,
        }
    }

    pub fn default_value(&self) -> Option<SettingValue> {
        match self {
            SettingLeaf::Bool { default, .. } => Some(SettingValue::Bool(*default)),
            SettingLeaf::Enum { default, .. } => Some(SettingValue::Enum(default.clone())),
            SettingLeaf::Int { default, .. } => Some(SettingValue::Int(*default)),
            SettingLeaf::Float { default, .. } => Some(SettingValue::Float(*default)),
            SettingLeaf::Unsupported { .. } => None,
        }
    }

    pub fn is_modified(&self) -> bool {
        match self {
            SettingLeaf::Bool { value, default } => value != default,
            SettingLeaf::Enum { value, default, .. } => value != default,
            SettingLeaf::Int { value, default, .. } => value != default,
            SettingLeaf::Float { value, default, .. } => value != default,
            SettingLeaf::Unsupported { .. } => false,
        }
    }

    /// Numeric leaves need a non-empty range, enums need at least one variant
    pub fn is_editable(&self) -> bool {
        match self {
            SettingLeaf::Bool { .. } => true,
            SettingLeaf::Enum { variants, .. } => !variants.is_empty(),
            SettingLeaf::Int { min, max, .. } => min < max,
            SettingLeaf::Float { min, max, .. } => min < max,
            SettingLeaf::Unsupported { .. } => false,
        }
    }

    /// Parse user input into a value of this leaf's type
    pub fn decode(&self, path: &SettingPath, raw: &str) -> Result<SettingValue, SettingsError> {
        let trimmed = raw.trim();
        let invalid = |expected: &'static str| SettingsError::InvalidValue {
            path: path.to_string(),
            raw: raw.to_string(),
            expected,
        };

        match self {
            SettingLeaf::Bool { .. } => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(SettingValue::Bool(true)),
                "false" | "off" | "no" | "0" => Ok(SettingValue::Bool(false)),
                _ => Err(invalid("bool")),
            },
            SettingLeaf::Enum { .. } => {
                // Accept both `Vulkan` and `"Vulkan"`
                let unquoted = match serde_json::from_str::<Value>(trimmed) {
                    Ok(Value::String(s)) => s,
                    _ => trimmed.to_string(),
                };
                Ok(SettingValue::Enum(unquoted))
            }
            SettingLeaf::Int { .. } => trimmed
                .parse()
                .map(SettingValue::Int)
                .map_err(|_| invalid("integer")),
            SettingLeaf::Float { .. } => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(SettingValue::Float)
                .ok_or_else(|| invalid("float")),
            SettingLeaf::Unsupported { .. } => Err(SettingsError::NotEditable(path.to_string())),
        }
    }

    /// Check that `value` can be written to this leaf
    pub fn validate(&self, path: &SettingPath, value: &SettingValue) -> Result<(), SettingsError> {
        if !self.is_editable() {
            return Err(SettingsError::NotEditable(path.to_string()));
        }

        let out_of_range = |value: String, min: String, max: String| SettingsError::OutOfRange {
            path: path.to_string(),
            value,
            min,
            max,
        };

        match (self, value) {
            (SettingLeaf::Bool { .. }, SettingValue::Bool(_)) => Ok(()),
            (SettingLeaf::Enum { variants, .. }, SettingValue::Enum(v)) => {
                if variants.contains(v) {
                    Ok(())
                } else {
                    Err(SettingsError::UnknownVariant {
                        path: path.to_string(),
                        value: v.clone(),
                        variants: variants.clone(),
                    })
                }
            }
            (SettingLeaf::Int { min, max, .. }, SettingValue::Int(v)) => {
                if (*min..=*max).contains(v) {
                    Ok(())
                } else {
                    Err(out_of_range(v.to_string(), min.to_string(), max.to_string()))
                }
            }
            (SettingLeaf::Float { min, max, .. }, SettingValue::Float(v)) => {
                if v.is_finite() && *min <= *v && *v <= *max {
                    Ok(())
                } else {
                    Err(out_of_range(v.to_string(), min.to_string(), max.to_string()))
                }
            }
            (leaf, value) => Err(SettingsError::TypeMismatch {
                path: path.to_string(),
                expected: match leaf {
                    SettingLeaf::Bool { .. } => "bool",
                    SettingLeaf::Enum { .. } => "enum",
                    SettingLeaf::Int { .. } => "int",
                    SettingLeaf::Float { .. } => "float",
                    SettingLeaf::Unsupported { .. } => "unsupported",
                },
                found: value.kind(),
            }),
        }
    }

    /// Store an already validated value
    pub(crate) fn apply(&mut self, new_value: SettingValue) {
        match (self, new_value) {
            (SettingLeaf::Bool { value, .. }, SettingValue::Bool(v)) => *value = v,
            (SettingLeaf::Enum { value, .. }, SettingValue::Enum(v)) => *value = v,
            (SettingLeaf::Int { value, .. }, SettingValue::Int(v)) => *value = v,
            (SettingLeaf::Float { value, .. }, SettingValue::Float(v)) => *value = v,
            (leaf, v) => debug!("Ignoring {} value for {} leaf", v.kind(), leaf.type_name()),
        }
    }

    /// Write the current value back into a document object, in document format
    /// (booleans as JSON booleans, everything else as strings)
    pub fn write_value(&self, obj: &mut Map<String, Value>) {
        let encoded = match self {
            SettingLeaf::Bool { value, .. } => Value::Bool(*value),
            SettingLeaf::Enum { value, .. } => Value::String(value.clone()),
            SettingLeaf::Int { value, .. } => Value::String(value.to_string()),
            SettingLeaf::Float { value, .. } => Value::String(value.to_string()),
            SettingLeaf::Unsupported { .. } => return,
        };
        obj.insert("value".to_string(), encoded);
    }
}

/// A node of the settings document
#[derive(Debug, Clone, PartialEq)]
pub enum SettingNode {
    /// Named children in document order
    Group(Vec<(String, SettingNode)>),
    Leaf(SettingLeaf),
}

impl SettingNode {
    /// Parse a full document snapshot; the root must be an object
    pub fn from_json(value: &Value) -> Result<Self, SettingsError> {
        let obj = value.as_object().ok_or_else(|| {
            SettingsError::InvalidDocument("root is not an object".to_string())
        })?;
        Ok(Self::from_object(obj, &SettingPath::root()))
    }

    fn from_object(obj: &Map<String, Value>, path: &SettingPath) -> Self {
        if let Some(type_name) = obj.get("type").and_then(Value::as_str) {
            let leaf = SettingLeaf::from_object(type_name, obj, path).unwrap_or_else(|reason| {
                warn!("Malformed {} setting {}: {}", type_name, path, reason);
                SettingLeaf::Unsupported {
                    type_name: type_name.to_string(),
                }
            });
            if let SettingLeaf::Unsupported { type_name } = &leaf {
                debug!("Unimplemented setting type {} at {}", type_name, path);
            }
            return SettingNode::Leaf(leaf);
        }

        let children = obj
            .iter()
            .filter_map(|(key, child)| {
                let child_obj = child.as_object()?;
                Some((key.clone(), Self::from_object(child_obj, &path.child(key))))
            })
            .collect();
        SettingNode::Group(children)
    }

    pub fn as_leaf(&self) -> Option<&SettingLeaf> {
        match self {
            SettingNode::Leaf(leaf) => Some(leaf),
            SettingNode::Group(_) => None,
        }
    }

    pub fn child(&self, key: &str) -> Option<&SettingNode> {
        match self {
            SettingNode::Group(children) => {
                children.iter().find(|(k, _)| k == key).map(|(_, n)| n)
            }
            SettingNode::Leaf(_) => None,
        }
    }

    fn child_mut(&mut self, key: &str) -> Option<&mut SettingNode> {
        match self {
            SettingNode::Group(children) => children
                .iter_mut()
                .find(|(k, _)| k == key)
                .map(|(_, n)| n),
            SettingNode::Leaf(_) => None,
        }
    }

    pub fn descend(&self, path: &SettingPath) -> Option<&SettingNode> {
        path.segments()
            .iter()
            .try_fold(self, |node, key| node.child(key))
    }

    pub fn descend_mut(&mut self, path: &SettingPath) -> Option<&mut SettingNode> {
        let mut node = self;
        for key in path.segments() {
            node = node.child_mut(key)?;
        }
        Some(node)
    }

    /// Number of leaves below this node
    pub fn leaf_count(&self) -> usize {
        match self {
            SettingNode::Leaf(_) => 1,
            SettingNode::Group(children) => children.iter().map(|(_, n)| n.leaf_count()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(value: Value) -> SettingLeaf {
        let obj = value.as_object().unwrap();
        let type_name = obj["type"].as_str().unwrap();
        SettingLeaf::from_object(type_name, obj, &SettingPath::root()).unwrap()
    }

    #[test]
    fn test_int_fields_encoded_as_strings() {
        let parsed = leaf(json!({
            "type": "uint", "value": "150", "default": "100", "min": "50", "max": "800"
        }));
        assert_eq!(
            parsed,
            SettingLeaf::Int {
                value: 150,
                default: 100,
                min: 50,
                max: 800,
                unsigned: true
            }
        );
        assert!(parsed.is_modified());
        assert!(parsed.is_editable());
    }

    #[test]
    fn test_malformed_numbers_read_as_zero() {
        let parsed = leaf(json!({ "type": "int", "value": "abc", "max": "10" }));
        assert_eq!(parsed.value(), Some(SettingValue::Int(0)));
        assert!(parsed.is_editable());

        let empty_range = leaf(json!({ "type": "float", "value": "1.5" }));
        assert!(!empty_range.is_editable());
    }

    #[test]
    fn test_enum_outside_variants_shows_first_variant() {
        let parsed = leaf(json!({
            "type": "enum", "value": "Legacy", "default": "Vulkan", "variants": ["Vulkan", "Null"]
        }));
        assert_eq!(parsed.value(), Some(SettingValue::Enum("Vulkan".into())));
        assert!(parsed.is_modified());
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let parsed = leaf(json!({ "type": "string", "value": "x" }));
        assert_eq!(parsed.type_name(), "string");
        assert!(!parsed.is_editable());
        assert_eq!(parsed.value(), None);
    }

    #[test]
    fn test_encode_for_engine() {
        assert_eq!(SettingValue::Bool(true).encode(), "true");
        assert_eq!(SettingValue::Enum("Vulkan".into()).encode(), "\"Vulkan\"");
        assert_eq!(SettingValue::Enum("a\"b".into()).encode(), r#""a\"b""#);
        assert_eq!(SettingValue::Int(-3).encode(), "-3");
        assert_eq!(SettingValue::Float(0.5).encode(), "0.5");
    }

    #[test]
    fn test_validate_bounds_and_types() {
        let path = SettingPath::from_segments(["Video", "Resolution Scale"]);
        let scale = leaf(json!({
            "type": "int", "value": "100", "default": "100", "min": "50", "max": "800"
        }));

        assert!(scale.validate(&path, &SettingValue::Int(800)).is_ok());
        assert!(matches!(
            scale.validate(&path, &SettingValue::Int(801)),
            Err(SettingsError::OutOfRange { .. })
        ));
        assert!(matches!(
            scale.validate(&path, &SettingValue::Bool(true)),
            Err(SettingsError::TypeMismatch { expected: "int", found: "bool", .. })
        ));
    }

    #[test]
    fn test_decode_user_input() {
        let path = SettingPath::root().child("x");
        let flag = leaf(json!({ "type": "bool", "value": false, "default": false }));
        assert_eq!(flag.decode(&path, "on").unwrap(), SettingValue::Bool(true));
        assert!(flag.decode(&path, "maybe").is_err());

        let mode = leaf(json!({ "type": "enum", "value": "A", "variants": ["A", "B"] }));
        assert_eq!(mode.decode(&path, "\"B\"").unwrap(), SettingValue::Enum("B".into()));

        let ratio = leaf(json!({ "type": "float", "value": "1", "min": "0", "max": "2" }));
        assert!(ratio.decode(&path, "NaN").is_err());
    }

    #[test]
    fn test_document_tree() {
        let doc = json!({
            "Core": {
                "PPU Threads": { "type": "int", "value": "2", "default": "2", "min": "1", "max": "8" },
                "Debug": { "Trace": { "type": "bool", "value": false, "default": false } }
            },
            "Version": 3
        });

        let root = SettingNode::from_json(&doc).unwrap();
        assert_eq!(root.leaf_count(), 2);

        let trace = root
            .descend(&SettingPath::from_segments(["Core", "Debug", "Trace"]))
            .and_then(SettingNode::as_leaf)
            .unwrap();
        assert_eq!(trace.value(), Some(SettingValue::Bool(false)));

        // Non-object members are not settings
        assert!(root.child("Version").is_none());
    }
}
