use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::client::DeviceInfo;
use crate::engine::CommandError;
use crate::engine::Device;
use crate::engine::EntityDescriptor;
use crate::engine::FromIntegrationMessage;
use crate::mapping::Capability;
use crate::mapping::CapabilityValue;
use crate::mapping::ControlError;
use crate::mapping::ControlPatch;
use crate::mapping::DeviceModel;
use crate::mapping::RefrigeratorBinder;
use crate::mapping::Snapshot;

/// One bridged refrigerator.
///
/// Holds the capability binding and the last snapshot seen while online,
/// which supplies the display unit for writes.
#[derive(Debug)]
pub struct Refrigerator {
    device_id: String,
    name: String,
    model_name: Option<String>,
    binder: RefrigeratorBinder,
    latest: RwLock<Snapshot>,
}

impl Refrigerator {
    /// The dashboard's model name is preferred; the model document's `Info`
    /// block fills in when the dashboard leaves it empty.
    pub fn new(info: &DeviceInfo, model: DeviceModel) -> Self {
        let model_name = Some(info.model_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| model.info().model_name.clone());
        let binder = RefrigeratorBinder::new(&info.device_id, Arc::new(model), &info.snapshot);
        Self {
            device_id: info.device_id.clone(),
            name: info.alias.clone(),
            model_name,
            binder,
            latest: RwLock::new(info.snapshot.clone()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Entity ids of every bound capability.
    pub fn entity_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.binder
            .capabilities()
            .iter()
            .map(|capability| capability.entity_id(&self.device_id))
    }

    fn capability(&self, entity_id: &str) -> Option<Capability> {
        self.binder
            .capabilities()
            .iter()
            .find(|capability| capability.entity_id(&self.device_id) == entity_id)
            .copied()
    }

    /// Messages declaring the device and its entities to the engine.
    pub fn announcements(&self, integration_name: &str) -> Vec<FromIntegrationMessage> {
        let mut device = Device::new(self.device_id.clone(), self.name.clone());
        device.manufacturer = Some("LG".to_string());
        device.model = self.model_name.clone();
        device.serial_number = Some(self.device_id.clone());

        let mut messages = vec![FromIntegrationMessage::DeviceDiscovered {
            device,
            integration_name: integration_name.to_string(),
        }];

        for capability in self.binder.capabilities() {
            let name = capability.name().to_string();
            let entity = match *capability {
                Capability::SetPoint { compartment, range } => EntityDescriptor::Thermostat {
                    name,
                    range,
                    index: compartment.index(),
                },
                Capability::Toggle(_) => EntityDescriptor::Switch { name },
                Capability::DoorSensor => EntityDescriptor::ContactSensor { name },
            };
            messages.push(FromIntegrationMessage::EntityDiscovered {
                entity_id: capability.entity_id(&self.device_id),
                device_id: Some(self.device_id.clone()),
                entity,
                integration_name: integration_name.to_string(),
            });
        }

        messages
    }

    /// Take in a new snapshot and return the state changes it carries.
    ///
    /// An offline snapshot changes nothing.
    pub async fn update(&self, snapshot: Snapshot) -> Vec<FromIntegrationMessage> {
        let Some(values) = self.binder.read(&snapshot) else {
            debug!("[{}] Device offline, keeping last values", self.device_id);
            return Vec::new();
        };
        *self.latest.write().await = snapshot;

        values
            .into_iter()
            .map(|value| self.state_message(value))
            .collect()
    }

    fn state_message(&self, value: CapabilityValue) -> FromIntegrationMessage {
        let entity_id = value.entity_id(&self.device_id);
        match value {
            // The device reports only its set point
            CapabilityValue::SetPoint { celsius, .. } => {
                FromIntegrationMessage::ThermostatStateChanged {
                    entity_id,
                    current_temperature: celsius,
                    target_temperature: celsius,
                }
            }
            CapabilityValue::Toggle { on, .. } => {
                FromIntegrationMessage::SwitchStateChanged { entity_id, on }
            }
            CapabilityValue::Door { closed } => FromIntegrationMessage::ContactSensorStateChanged {
                entity_id,
                contact_detected: closed,
            },
        }
    }

    /// Patch setting the thermostat `entity_id` to `celsius`.
    pub async fn write_temperature(
        &self,
        entity_id: &str,
        celsius: f64,
    ) -> Result<ControlPatch, CommandError> {
        match self.capability(entity_id) {
            Some(Capability::SetPoint { compartment, .. }) => {
                let latest = self.latest.read().await;
                self.binder
                    .write_temperature(compartment, celsius, &latest)
                    .map_err(command_error)
            }
            Some(_) => Err(CommandError::Unsupported(entity_id.to_string())),
            None => Err(CommandError::UnknownEntity(entity_id.to_string())),
        }
    }

    /// Patch switching the switch `entity_id`.
    pub async fn write_switch(&self, entity_id: &str, on: bool) -> Result<ControlPatch, CommandError> {
        match self.capability(entity_id) {
            Some(Capability::Toggle(toggle)) => {
                let latest = self.latest.read().await;
                self.binder
                    .write_toggle(toggle, on, &latest)
                    .map_err(command_error)
            }
            Some(_) => Err(CommandError::Unsupported(entity_id.to_string())),
            None => Err(CommandError::UnknownEntity(entity_id.to_string())),
        }
    }
}

fn command_error(err: ControlError) -> CommandError {
    match err {
        ControlError::InvalidValue { .. } => CommandError::InvalidValue(err.to_string()),
        ControlError::Schema(_) => CommandError::Integration(err.to_string()),
    }
}
