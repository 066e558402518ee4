//! Type-safe message system for thinqd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use tokio::sync::oneshot;

use super::device::Device;
use super::entity::EntityDescriptor;

/// Why a command was not carried out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("no entity named {0}")]
    UnknownEntity(String),

    #[error("{0} does not accept this command")]
    Unsupported(String),

    #[error("{value} is outside the range {min}..={max}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// The device has no raw value for the request.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("integration failed to execute command: {0}")]
    Integration(String),

    #[error("integration is not running")]
    ChannelClosed,
}

/// Channel the integration answers a command on.
pub type CommandReply = oneshot::Sender<Result<(), CommandError>>;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug)]
pub enum FromIntegrationMessage {
    /// A device was discovered; its entities follow as `EntityDiscovered`
    DeviceDiscovered {
        device: Device,
        integration_name: String,
    },

    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        device_id: Option<String>,
        entity: EntityDescriptor,
        integration_name: String,
    },

    /// An entity was removed (device unplugged, etc.)
    EntityRemoved { entity_id: String },

    /// A thermostat's temperatures changed
    ThermostatStateChanged {
        entity_id: String,
        current_temperature: f64,
        target_temperature: f64,
    },

    /// A switch was turned on or off
    SwitchStateChanged { entity_id: String, on: bool },

    /// A contact sensor opened or closed
    ContactSensorStateChanged {
        entity_id: String,
        contact_detected: bool,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug)]
pub enum ToIntegrationMessage {
    /// Command to change a thermostat's target temperature (Celsius)
    SetTargetTemperature {
        entity_id: String,
        celsius: f64,
        reply: CommandReply,
    },

    /// Command to turn a switch on or off
    SetSwitch {
        entity_id: String,
        on: bool,
        reply: CommandReply,
    },
}

impl ToIntegrationMessage {
    pub fn entity_id(&self) -> &str {
        match self {
            ToIntegrationMessage::SetTargetTemperature { entity_id, .. } => entity_id,
            ToIntegrationMessage::SetSwitch { entity_id, .. } => entity_id,
        }
    }
}
