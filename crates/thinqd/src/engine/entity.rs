//! Entity abstraction for thinqd
//!
//! Integrations declare each entity (thermostats, switches, sensors) once,
//! up front, so the engine knows which commands it accepts and which values
//! are legal before any state arrives.

use serde::Serialize;

use crate::mapping::TemperatureRange;

/// Platform type of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Thermostat,
    Switch,
    ContactSensor,
}

/// Declaration of an entity as sent by its integration.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDescriptor {
    /// Writable set point with a declared range and step
    Thermostat {
        name: String,
        range: TemperatureRange,
        /// Position among the device's thermostats
        index: u8,
    },
    /// Writable on/off
    Switch { name: String },
    /// Read-only open/closed
    ContactSensor { name: String },
}

impl EntityDescriptor {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDescriptor::Thermostat { .. } => EntityKind::Thermostat,
            EntityDescriptor::Switch { .. } => EntityKind::Switch,
            EntityDescriptor::ContactSensor { .. } => EntityKind::ContactSensor,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntityDescriptor::Thermostat { name, .. } => name,
            EntityDescriptor::Switch { name } => name,
            EntityDescriptor::ContactSensor { name } => name,
        }
    }
}

/// What the engine remembers about a registered entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub name: String,
    pub kind: EntityKind,
    pub device_id: Option<String>,
    pub integration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
}
