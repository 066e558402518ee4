//! Per-device monitoring value model.
//!
//! ThinQ describes every monitored field of a device as a table from raw code
//! to label:
//!
//! ```json
//! "MonitoringValue": {
//!   "fridgeTemp_C": {
//!     "dataType": "enum",
//!     "valueMapping": { "1": { "index": "1", "label": "7" }, ... }
//!   },
//!   "expressMode": {
//!     "valueMapping": { "EXPRESS_ON": { "index": "EXPRESS_ON", "label": "@CP_ON_EN_W" }, ... }
//!   }
//! }
//! ```
//!
//! The shape varies between models and firmware, so fields are only checked
//! when they are looked up.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

/// A field was requested that the device model does not describe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' is not described by the device model")]
pub struct SchemaError {
    pub field: String,
}

/// Ordered code -> label table of one monitored field.
///
/// Codes are unique. Labels may repeat; reverse lookups prefer the lowest
/// integer code, then the first non-integer code in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMapping {
    entries: Vec<(String, String)>,
}

impl ValueMapping {
    /// Label for a raw code.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, label)| label.as_str())
    }

    /// Code whose label equals `label`.
    pub fn code_for(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (_, l))| l == label)
            .min_by_key(|(position, (code, _))| {
                let integer = integer_code(code);
                (integer.is_none(), integer, *position)
            })
            .map(|(_, (code, _))| code.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(code, label)| (code.as_str(), label.as_str()))
    }

    /// Labels that parse as numbers. Sentinels such as `IGNORE` are skipped.
    pub fn numeric_labels(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries
            .iter()
            .filter_map(|(_, label)| label.trim().parse::<f64>().ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels shared by more than one code.
    fn duplicate_labels(&self) -> Vec<&str> {
        let mut duplicates: Vec<&str> = Vec::new();
        for (i, (_, label)) in self.entries.iter().enumerate() {
            let seen_before = self.entries[..i].iter().any(|(_, l)| l == label);
            if seen_before && !duplicates.contains(&label.as_str()) {
                duplicates.push(label);
            }
        }
        duplicates
    }
}

/// Canonical non-negative integer codes such as `"0"` or `"12"`. `"01"` and
/// `"-1"` are plain strings.
fn integer_code(code: &str) -> Option<u32> {
    if code.len() > 1 && code.starts_with('0') {
        return None;
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.parse().ok()
}

impl<C: Into<String>, L: Into<String>> FromIterator<(C, L)> for ValueMapping {
    fn from_iter<I: IntoIterator<Item = (C, L)>>(iter: I) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (code, label) in iter {
            let code = code.into();
            // First occurrence of a code wins
            if entries.iter().any(|(c, _)| *c == code) {
                continue;
            }
            entries.push((code, label.into()));
        }
        Self { entries }
    }
}

/// Descriptive metadata from the model's `Info` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
}

#[derive(Deserialize)]
struct RawModel {
    #[serde(rename = "Info", alias = "info", default)]
    info: ModelInfo,

    #[serde(rename = "MonitoringValue", alias = "monitoringValue", default)]
    monitoring_value: serde_json::Map<String, serde_json::Value>,
}

/// Schema of one device: every monitored field's value mapping.
///
/// Immutable once loaded; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct DeviceModel {
    info: ModelInfo,
    monitoring: HashMap<String, ValueMapping>,
}

impl DeviceModel {
    /// Parse a ThinQ v2 model description.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawModel = serde_json::from_slice(bytes)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let raw: RawModel = serde_json::from_value(value)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawModel) -> Self {
        let mut monitoring = HashMap::new();
        for (field, definition) in raw.monitoring_value {
            let mapping = parse_value_mapping(&definition);
            for label in mapping.duplicate_labels() {
                warn!(
                    "Device model field '{}' maps label '{}' from several codes; the lowest code wins",
                    field, label
                );
            }
            monitoring.insert(field, mapping);
        }

        Self {
            info: raw.info,
            monitoring,
        }
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.monitoring.contains_key(field)
    }

    /// The value mapping of `field`.
    pub fn monitoring_value_mapping(&self, field: &str) -> Result<&ValueMapping, SchemaError> {
        self.monitoring.get(field).ok_or_else(|| SchemaError {
            field: field.to_string(),
        })
    }

    /// Label for `code` in `field`, or `default` when either is unknown.
    ///
    /// Missing telemetry is expected (e.g. before the first snapshot), so this
    /// never fails.
    pub fn lookup_monitor_value<'a>(&'a self, field: &str, code: &str, default: &'a str) -> &'a str {
        self.monitoring
            .get(field)
            .and_then(|mapping| mapping.get(code))
            .unwrap_or(default)
    }

    /// Raw code that `field` uses for a semantic key such as `@CP_ON_EN_W`.
    ///
    /// `None` means the model does not support that state.
    pub fn lookup_monitor_name(&self, field: &str, semantic_key: &str) -> Option<&str> {
        self.monitoring
            .get(field)
            .and_then(|mapping| mapping.code_for(semantic_key))
    }
}

/// Entries whose value is not an object with a string or numeric `label`
/// (e.g. `range` fields with `min`/`max`) are dropped.
fn parse_value_mapping(definition: &serde_json::Value) -> ValueMapping {
    let Some(entries) = definition.get("valueMapping").and_then(|v| v.as_object()) else {
        return ValueMapping::default();
    };

    entries
        .iter()
        .filter_map(|(code, entry)| {
            let label = match entry.get("label")? {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((code.clone(), label))
        })
        .collect()
}
