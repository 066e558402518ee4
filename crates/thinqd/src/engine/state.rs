use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::device::Device;
use super::entity::EntityInfo;
use crate::mapping::TemperatureRange;

/// Operating mode of a thermostat. Refrigerator compartments only cool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    #[default]
    Cool,
}

/// State of a thermostat entity. Temperatures are in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermostatState {
    /// Legal target temperatures.
    pub range: TemperatureRange,

    /// Both current and target mode are fixed to cooling.
    pub mode: HvacMode,

    /// Unset until the first state report arrives.
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
}

impl ThermostatState {
    pub fn new(range: TemperatureRange) -> Self {
        Self {
            range,
            mode: HvacMode::Cool,
            current_temperature: None,
            target_temperature: None,
        }
    }
}

/// State of a switch entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchState {
    pub on: bool,
}

/// State of a contact sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactSensorState {
    /// Whether the contact is closed (e.g. every door shut).
    pub contact_detected: bool,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub devices: HashMap<String, Device>,
    pub entities: HashMap<String, EntityInfo>,
    pub thermostats: HashMap<String, ThermostatState>,
    pub switches: HashMap<String, SwitchState>,
    pub contact_sensors: HashMap<String, ContactSensorState>,
}

impl State {
    /// Drop an entity from every map it may appear in.
    pub(crate) fn remove_entity(&mut self, entity_id: &str) {
        self.entities.remove(entity_id);
        self.thermostats.remove(entity_id);
        self.switches.remove(entity_id);
        self.contact_sensors.remove(entity_id);
        for device in self.devices.values_mut() {
            device.entity_ids.retain(|id| id != entity_id);
        }
    }
}
