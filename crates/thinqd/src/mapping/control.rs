use serde::Serialize;

use super::DeviceModel;
use super::OFF_KEY;
use super::ON_KEY;
use super::STATE_GROUP;
use super::SchemaError;
use super::TempUnit;
use super::UnitContext;
use super::field;
use super::unit::format_label;

/// Why a capability write could not be turned into a control patch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The requested value has no raw code in the device's mapping.
    #[error("value {value} is not supported by '{field}' ({unit})")]
    InvalidValue {
        field: String,
        value: String,
        unit: TempUnit,
    },
}

/// Body of a ThinQ `control-sync` request.
///
/// Serializes as
/// `{"dataKey":null,"dataValue":null,"dataSetList":{"refState":{...}},"dataGetList":null}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPatch {
    data_key: Option<String>,
    data_value: Option<String>,
    data_set_list: serde_json::Map<String, serde_json::Value>,
    data_get_list: Option<serde_json::Value>,
}

impl ControlPatch {
    /// A patch setting `fields` inside one state group.
    pub fn new(group: &str, fields: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut data_set_list = serde_json::Map::new();
        data_set_list.insert(group.to_string(), serde_json::Value::Object(fields));
        Self {
            data_key: None,
            data_value: None,
            data_set_list,
            data_get_list: None,
        }
    }

    /// Value written to `field` in `group`.
    pub fn get(&self, group: &str, field: &str) -> Option<&str> {
        self.data_set_list.get(group)?.get(field)?.as_str()
    }
}

/// Turns desired capability values into control patches for one device,
/// in the unit the device is currently displaying.
#[derive(Debug, Clone, Copy)]
pub struct ControlTranslator<'a> {
    model: &'a DeviceModel,
    units: UnitContext,
}

impl<'a> ControlTranslator<'a> {
    pub fn new(model: &'a DeviceModel, units: UnitContext) -> Self {
        Self { model, units }
    }

    /// Patch setting a temperature field to `celsius`.
    ///
    /// When the device displays Fahrenheit the value is converted and rounded
    /// to a whole degree before it is matched against the `_F` mapping.
    pub fn temperature(&self, field: &str, celsius: f64) -> Result<ControlPatch, ControlError> {
        let key = self.units.field_key(field);
        let mapping = self.model.monitoring_value_mapping(&key)?;
        let label = format_label(self.units.from_canonical(celsius));

        let code = mapping
            .code_for(&label)
            .ok_or_else(|| ControlError::InvalidValue {
                field: key.clone(),
                value: label.clone(),
                unit: self.units.unit(),
            })?;

        Ok(self.patch(field, code))
    }

    /// Patch switching a toggle field on or off.
    pub fn toggle(&self, field: &str, on: bool) -> Result<ControlPatch, ControlError> {
        let semantic_key = if on { ON_KEY } else { OFF_KEY };
        let mapping = self.model.monitoring_value_mapping(field)?;

        let code = mapping
            .code_for(semantic_key)
            .ok_or_else(|| ControlError::InvalidValue {
                field: field.to_string(),
                value: semantic_key.to_string(),
                unit: self.units.unit(),
            })?;

        Ok(self.patch(field, code))
    }

    /// Every write echoes the current display unit so the device does not
    /// reinterpret the value.
    fn patch(&self, name: &str, code: &str) -> ControlPatch {
        let mut fields = serde_json::Map::new();
        fields.insert(name.to_string(), code.into());
        fields.insert(field::TEMP_UNIT.to_string(), self.units.unit().as_str().into());
        ControlPatch::new(STATE_GROUP, fields)
    }
}
