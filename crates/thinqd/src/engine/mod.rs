mod device;
mod engine;
mod entity;
mod integration;
mod message;
pub mod state;

pub use device::Device;
pub use engine::Engine;
pub use entity::EntityDescriptor;
pub use entity::EntityInfo;
pub use entity::EntityKind;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationError;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::CommandError;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use state::ContactSensorState;
pub use state::HvacMode;
pub use state::State;
pub use state::SwitchState;
pub use state::ThermostatState;
