//! Binding of refrigerator fields to engine capabilities.
//!
//! Which optional capabilities exist is decided once, from the snapshot seen
//! when the accessory is built: it reflects the model and firmware, not the
//! current state.

use std::sync::Arc;

use serde::Serialize;
use strum::EnumIter;
use strum::IntoEnumIterator;
use strum::IntoStaticStr;
use tracing::debug;
use tracing::warn;

use super::ControlError;
use super::ControlPatch;
use super::ControlTranslator;
use super::DeviceModel;
use super::OFF_KEY;
use super::ON_KEY;
use super::SchemaError;
use super::Snapshot;
use super::StatusView;
use super::field;

/// A temperature-controlled compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Compartment {
    Fridge,
    Freezer,
}

impl Compartment {
    pub fn field(self) -> &'static str {
        match self {
            Compartment::Fridge => field::FRIDGE_TEMP,
            Compartment::Freezer => field::FREEZER_TEMP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compartment::Fridge => "Fridge",
            Compartment::Freezer => "Freezer",
        }
    }

    /// Position of the compartment when the accessory lists its services.
    pub fn index(self) -> u8 {
        match self {
            Compartment::Fridge => 1,
            Compartment::Freezer => 2,
        }
    }
}

/// An optional on/off feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Toggle {
    ExpressMode,
    ExpressFridge,
    EcoFriendly,
}

impl Toggle {
    pub fn field(self) -> &'static str {
        match self {
            Toggle::ExpressMode => field::EXPRESS_MODE,
            Toggle::ExpressFridge => field::EXPRESS_FRIDGE,
            Toggle::EcoFriendly => field::ECO_FRIENDLY,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Toggle::ExpressMode => "Express Mode",
            Toggle::ExpressFridge => "Express Fridge",
            Toggle::EcoFriendly => "Eco Friendly",
        }
    }
}

/// Legal set-point values, in Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl TemperatureRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One capability an accessory exposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capability {
    /// Cool-only thermostat holding a compartment's set point.
    SetPoint {
        compartment: Compartment,
        range: TemperatureRange,
    },
    /// Read/write switch.
    Toggle(Toggle),
    /// Read-only contact sensor, closed when every door is shut.
    DoorSensor,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::SetPoint { compartment, .. } => compartment.name(),
            Capability::Toggle(toggle) => toggle.name(),
            Capability::DoorSensor => "Refrigerator Door Closed",
        }
    }

    /// Entity id this capability is registered under for a device,
    /// e.g. `thermostat.<device>_fridge`.
    pub fn entity_id(&self, device_id: &str) -> String {
        match *self {
            Capability::SetPoint { compartment, .. } => {
                entity_id("thermostat", device_id, compartment.into())
            }
            Capability::Toggle(toggle) => entity_id("switch", device_id, toggle.into()),
            Capability::DoorSensor => entity_id("contact_sensor", device_id, "door"),
        }
    }
}

/// Value of one capability read from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapabilityValue {
    SetPoint { compartment: Compartment, celsius: f64 },
    Toggle { toggle: Toggle, on: bool },
    Door { closed: bool },
}

impl CapabilityValue {
    /// Entity id of the capability this value belongs to.
    pub fn entity_id(&self, device_id: &str) -> String {
        match *self {
            CapabilityValue::SetPoint { compartment, .. } => {
                entity_id("thermostat", device_id, compartment.into())
            }
            CapabilityValue::Toggle { toggle, .. } => {
                entity_id("switch", device_id, toggle.into())
            }
            CapabilityValue::Door { .. } => entity_id("contact_sensor", device_id, "door"),
        }
    }
}

fn entity_id(platform: &str, device_id: &str, suffix: &'static str) -> String {
    format!("{}.{}_{}", platform, device_id, suffix)
}

/// The capabilities of one refrigerator and their read/write paths.
#[derive(Debug, Clone)]
pub struct RefrigeratorBinder {
    model: Arc<DeviceModel>,
    capabilities: Vec<Capability>,
}

impl RefrigeratorBinder {
    /// Decide which capabilities the device has.
    ///
    /// Set points whose mapping is missing or has no numeric label are
    /// omitted with a warning. Toggles exist only if `initial` carries their
    /// field and the model names both their on and off codes.
    pub fn new(device_id: &str, model: Arc<DeviceModel>, initial: &Snapshot) -> Self {
        let status = StatusView::new(initial, &model);
        let mut capabilities = Vec::new();

        for compartment in Compartment::iter() {
            match set_point_range(&model, &status, compartment) {
                Ok(Some(range)) => capabilities.push(Capability::SetPoint { compartment, range }),
                Ok(None) => warn!(
                    "[{}] {} mapping has no numeric values, omitting set point",
                    device_id,
                    compartment.name()
                ),
                Err(e) => warn!("[{}] Omitting {} set point: {}", device_id, compartment.name(), e),
            }
        }

        capabilities.push(Capability::DoorSensor);

        for toggle in Toggle::iter() {
            if !initial.contains(toggle.field()) {
                debug!("[{}] {} not reported, not creating it", device_id, toggle.name());
                continue;
            }

            let field = toggle.field();
            match (
                model.lookup_monitor_name(field, ON_KEY),
                model.lookup_monitor_name(field, OFF_KEY),
            ) {
                (Some(_), Some(_)) => capabilities.push(Capability::Toggle(toggle)),
                _ => warn!(
                    "[{}] Omitting {}: model has no on/off codes for '{}'",
                    device_id,
                    toggle.name(),
                    field
                ),
            }
        }

        Self {
            model,
            capabilities,
        }
    }

    pub fn model(&self) -> &DeviceModel {
        &self.model
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Current value of every bound capability.
    ///
    /// `None` for an offline snapshot, whose values must not replace the last
    /// known ones.
    pub fn read(&self, snapshot: &Snapshot) -> Option<Vec<CapabilityValue>> {
        let status = StatusView::new(snapshot, &self.model);
        if !status.is_online() {
            return None;
        }

        let values = self.capabilities
            .iter()
            .map(|capability| match *capability {
                Capability::SetPoint { compartment, .. } => CapabilityValue::SetPoint {
                    compartment,
                    celsius: match compartment {
                        Compartment::Fridge => status.fridge_temperature(),
                        Compartment::Freezer => status.freezer_temperature(),
                    },
                },
                Capability::Toggle(toggle) => CapabilityValue::Toggle {
                    toggle,
                    on: status.is_toggle_on(toggle.field()),
                },
                Capability::DoorSensor => CapabilityValue::Door {
                    closed: status.is_door_closed(),
                },
            })
            .collect();
        Some(values)
    }

    /// Patch setting a compartment to `celsius`, in the unit of `current`.
    pub fn write_temperature(
        &self,
        compartment: Compartment,
        celsius: f64,
        current: &Snapshot,
    ) -> Result<ControlPatch, ControlError> {
        let status = StatusView::new(current, &self.model);
        ControlTranslator::new(&self.model, status.units()).temperature(compartment.field(), celsius)
    }

    /// Patch switching a toggle, echoing the unit of `current`.
    pub fn write_toggle(
        &self,
        toggle: Toggle,
        on: bool,
        current: &Snapshot,
    ) -> Result<ControlPatch, ControlError> {
        let status = StatusView::new(current, &self.model);
        ControlTranslator::new(&self.model, status.units()).toggle(toggle.field(), on)
    }
}

/// Range of a compartment's set point in the current unit's mapping,
/// converted to Celsius.
fn set_point_range(
    model: &DeviceModel,
    status: &StatusView<'_>,
    compartment: Compartment,
) -> Result<Option<TemperatureRange>, SchemaError> {
    let units = status.units();
    let mapping = model.monitoring_value_mapping(&units.field_key(compartment.field()))?;

    let range = mapping
        .numeric_labels()
        .map(|value| units.to_canonical(value))
        .fold(None, |range: Option<(f64, f64)>, value| match range {
            Some((min, max)) => Some((min.min(value), max.max(value))),
            None => Some((value, value)),
        });

    Ok(range.map(|(min, max)| TemperatureRange {
        min,
        max,
        step: units.step(),
    }))
}
