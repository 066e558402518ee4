//! Translation between the ThinQ monitoring value model and the capabilities
//! exposed to the engine.
//!
//! Reads flow `Snapshot` + `DeviceModel` -> `StatusView` -> capability values.
//! Writes flow capability value -> `ControlTranslator` -> `ControlPatch`.

mod capability;
mod control;
mod model;
mod snapshot;
mod status;
mod unit;

pub use capability::Capability;
pub use capability::CapabilityValue;
pub use capability::Compartment;
pub use capability::RefrigeratorBinder;
pub use capability::TemperatureRange;
pub use capability::Toggle;
pub use control::ControlError;
pub use control::ControlPatch;
pub use control::ControlTranslator;
pub use model::DeviceModel;
pub use model::ModelInfo;
pub use model::SchemaError;
pub use model::ValueMapping;
pub use snapshot::Snapshot;
pub use status::StatusView;
pub use unit::TempUnit;
pub use unit::UnitContext;
pub use unit::to_celsius;
pub use unit::to_fahrenheit;

/// Name of the snapshot group that holds refrigerator state, and of the
/// `dataSetList` group control patches are written to.
pub const STATE_GROUP: &str = "refState";

/// Semantic key the model uses for the "on" state of a toggle field.
pub const ON_KEY: &str = "@CP_ON_EN_W";

/// Semantic key the model uses for the "off" state of a toggle field.
pub const OFF_KEY: &str = "@CP_OFF_EN_W";

/// Raw field names inside the `refState` group.
pub mod field {
    pub const FRIDGE_TEMP: &str = "fridgeTemp";
    pub const FREEZER_TEMP: &str = "freezerTemp";
    pub const TEMP_UNIT: &str = "tempUnit";
    pub const DOOR_OPEN: &str = "atLeastOneDoorOpen";
    pub const EXPRESS_MODE: &str = "expressMode";
    pub const EXPRESS_FRIDGE: &str = "expressFridge";
    pub const ECO_FRIENDLY: &str = "ecoFriendly";
}

/// Raw value of `atLeastOneDoorOpen` when every door is shut.
pub const DOOR_CLOSED: &str = "CLOSE";

#[cfg(test)]
pub(crate) mod fixtures {
    use super::DeviceModel;
    use super::Snapshot;

    pub const MODEL_JSON: &str = include_str!("../../tests/fixtures/refrigerator_model.json");
    pub const DEVICE_JSON: &str = include_str!("../../tests/fixtures/refrigerator_device.json");

    pub fn model() -> DeviceModel {
        DeviceModel::from_slice(MODEL_JSON.as_bytes()).unwrap()
    }

    pub fn device_json() -> serde_json::Value {
        serde_json::from_str(DEVICE_JSON).unwrap()
    }

    /// The fixture device's snapshot, with `refState` fields overridden.
    pub fn snapshot_with(overrides: serde_json::Value) -> Snapshot {
        let mut device = device_json();
        if let Some(fields) = overrides.as_object() {
            for (key, value) in fields {
                device["snapshot"]["refState"][key] = value.clone();
            }
        }
        Snapshot::from_device(&device)
    }

    pub fn snapshot() -> Snapshot {
        snapshot_with(serde_json::json!({}))
    }
}
