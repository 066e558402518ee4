pub mod api;
pub mod config;
mod engine;
mod integrations;
pub mod mapping;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::CommandError;
pub use engine::ContactSensorState;
pub use engine::Device;
pub use engine::Engine;
pub use engine::EntityInfo;
pub use engine::EntityKind;
pub use engine::HvacMode;
pub use engine::State;
pub use engine::SwitchState;
pub use engine::ThermostatState;
pub use integrations::thinq;
