use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::entity::EntityDescriptor;
use super::entity::EntityInfo;
use super::entity::EntityKind;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::CommandError;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::ContactSensorState;
use super::state::State;
use super::state::SwitchState;
use super::state::ThermostatState;
use crate::engine::IntegrationContext;

/// thinqd engine
///
/// This structure handles the flow of events, routing commands to the
/// integration that owns an entity, and maintaining a view of the world with
/// State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: HashMap<String, ToIntegrationSender>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: Vec<JoinHandle<()>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: HashMap::new(),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: Vec::new(),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every registered integration factory; factories return `None`
    /// when their integration is not configured.
    pub fn register_integrations_from_config(
        &mut self,
        cfg: &crate::config::Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }

        Ok(())
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        self.integration_channels
            .insert(name.clone(), to_integration_tx);

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine, one at a time
            while let Some(command) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_command(command).await {
                    warn!("Integration '{}' failed to handle command: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        self.integration_handles.push(handle);
    }

    /// Send a command to an integration
    ///
    /// Routes the command to the appropriate integration based on entity_id.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), CommandError> {
        let entity_id = msg.entity_id().to_string();

        // Route to the integration that owns this entity
        let integration_name = {
            let map = self
                .entity_integration_map
                .lock()
                .map_err(|e| CommandError::Integration(e.to_string()))?;
            map.get(&entity_id)
                .cloned()
                .ok_or_else(|| CommandError::UnknownEntity(entity_id.clone()))?
        };

        let tx = self
            .integration_channels
            .get(&integration_name)
            .ok_or(CommandError::ChannelClosed)?;

        tx.send(msg).map_err(|_| CommandError::ChannelClosed)
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        // Main event loop - only receives FromIntegration messages
        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            if let Err(e) = self.handle_event(msg).await {
                warn!("Error handling event: {}", e);
            }
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Ask a thermostat to move to `celsius`.
    ///
    /// Values outside the declared range are rejected here; values the device
    /// cannot represent are rejected by the integration.
    pub async fn set_target_temperature(
        &self,
        entity_id: &str,
        celsius: f64,
    ) -> Result<(), CommandError> {
        {
            let state = self.state.load();
            self.check_kind(&state, entity_id, EntityKind::Thermostat)?;
            if let Some(thermostat) = state.thermostats.get(entity_id) {
                let range = thermostat.range;
                if !range.contains(celsius) {
                    return Err(CommandError::OutOfRange {
                        value: celsius,
                        min: range.min,
                        max: range.max,
                    });
                }
            }
        }

        let (reply, rx) = oneshot::channel();
        self.send_command(ToIntegrationMessage::SetTargetTemperature {
            entity_id: entity_id.to_string(),
            celsius,
            reply,
        })?;
        rx.await.map_err(|_| CommandError::ChannelClosed)?
    }

    /// Turn a switch on or off.
    pub async fn set_switch(&self, entity_id: &str, on: bool) -> Result<(), CommandError> {
        {
            let state = self.state.load();
            self.check_kind(&state, entity_id, EntityKind::Switch)?;
        }

        let (reply, rx) = oneshot::channel();
        self.send_command(ToIntegrationMessage::SetSwitch {
            entity_id: entity_id.to_string(),
            on,
            reply,
        })?;
        rx.await.map_err(|_| CommandError::ChannelClosed)?
    }

    fn check_kind(
        &self,
        state: &State,
        entity_id: &str,
        expected: EntityKind,
    ) -> Result<(), CommandError> {
        let info = state
            .entities
            .get(entity_id)
            .ok_or_else(|| CommandError::UnknownEntity(entity_id.to_string()))?;
        if info.kind != expected {
            return Err(CommandError::Unsupported(entity_id.to_string()));
        }
        Ok(())
    }

    /// Apply `f` to a copy of the state and publish it.
    ///
    /// Only the event loop writes, so there is a single writer.
    fn update_state(&self, f: impl FnOnce(&mut State)) {
        let mut state = State::clone(&self.state.load());
        f(&mut state);
        self.state.store(Arc::new(state));
    }

    /// Handle an event from an integration
    pub(crate) async fn handle_event(&self, msg: FromIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            FromIntegrationMessage::DeviceDiscovered {
                device,
                integration_name,
            } => {
                info!(
                    "Device discovered: {} '{}' (from {})",
                    device.id, device.name, integration_name
                );
                self.update_state(|state| {
                    let entity_ids = state
                        .devices
                        .get(&device.id)
                        .map(|d| d.entity_ids.clone())
                        .unwrap_or_default();
                    let mut device = device;
                    for id in entity_ids {
                        device.add_entity(id);
                    }
                    state.devices.insert(device.id.clone(), device);
                });
            }
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                device_id,
                entity,
                integration_name,
            } => {
                info!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                // Record which integration owns this entity for command routing.
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id.clone(), integration_name.clone());
                }

                self.update_state(|state| {
                    let index = match &entity {
                        EntityDescriptor::Thermostat { range, index, .. } => {
                            // Create or update the declaration, keeping any reported values
                            state
                                .thermostats
                                .entry(entity_id.clone())
                                .and_modify(|t| t.range = *range)
                                .or_insert_with(|| ThermostatState::new(*range));
                            Some(*index)
                        }
                        _ => None,
                    };

                    if let Some(device) = device_id.as_ref().and_then(|id| state.devices.get_mut(id)) {
                        device.add_entity(entity_id.clone());
                    }

                    state.entities.insert(
                        entity_id,
                        EntityInfo {
                            name: entity.name().to_string(),
                            kind: entity.kind(),
                            device_id,
                            integration: integration_name,
                            index,
                        },
                    );
                });
            }
            FromIntegrationMessage::EntityRemoved { entity_id } => {
                info!("Entity removed: {}", entity_id);

                self.update_state(|state| state.remove_entity(&entity_id));

                // Remove from routing map
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.remove(&entity_id);
                }
            }
            FromIntegrationMessage::ThermostatStateChanged {
                entity_id,
                current_temperature,
                target_temperature,
            } => {
                if !self.state.load().thermostats.contains_key(&entity_id) {
                    warn!("State change for undeclared thermostat {}", entity_id);
                    return Ok(());
                }

                debug!(
                    "Thermostat state changed: {} -> current={}, target={}",
                    entity_id, current_temperature, target_temperature
                );
                self.update_state(|state| {
                    if let Some(thermostat) = state.thermostats.get_mut(&entity_id) {
                        thermostat.current_temperature = Some(current_temperature);
                        thermostat.target_temperature = Some(target_temperature);
                    }
                });
            }
            FromIntegrationMessage::SwitchStateChanged { entity_id, on } => {
                debug!("Switch state changed: {} -> on={}", entity_id, on);
                self.update_state(|state| {
                    state.switches.insert(entity_id, SwitchState { on });
                });
            }
            FromIntegrationMessage::ContactSensorStateChanged {
                entity_id,
                contact_detected,
            } => {
                debug!(
                    "Contact sensor state changed: {} -> contact_detected={}",
                    entity_id, contact_detected
                );
                self.update_state(|state| {
                    state
                        .contact_sensors
                        .insert(entity_id, ContactSensorState { contact_detected });
                });
            }
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::engine::Device;
    use crate::mapping::TemperatureRange;

    const FRIDGE: &str = "thermostat.fridge_fridge";
    const EXPRESS: &str = "switch.fridge_express_mode";
    const DOOR: &str = "contact_sensor.fridge_door";

    type Received = Arc<std::sync::Mutex<Vec<String>>>;

    /// Integration that accepts every command except a target of 5.5 °C.
    struct FakeIntegration {
        received: Received,
    }

    #[async_trait]
    impl Integration for FakeIntegration {
        fn name(&self) -> &str {
            "fake"
        }

        async fn setup(&mut self, _tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }

        async fn handle_command(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            self.received.lock().unwrap().push(msg.entity_id().to_string());
            match msg {
                ToIntegrationMessage::SetTargetTemperature { celsius, reply, .. } => {
                    let result = if celsius == 5.5 {
                        Err(CommandError::InvalidValue("5.5".to_string()))
                    } else {
                        Ok(())
                    };
                    let _ = reply.send(result);
                }
                ToIntegrationMessage::SetSwitch { reply, .. } => {
                    let _ = reply.send(Ok(()));
                }
            }
            Ok(())
        }
    }

    fn range() -> TemperatureRange {
        TemperatureRange {
            min: 1.0,
            max: 7.0,
            step: 1.0,
        }
    }

    async fn engine_with_entities() -> (Engine, Received) {
        let received = Received::default();
        let mut engine = Engine::new();
        engine.register_integration(
            "fake".to_string(),
            Box::new(FakeIntegration {
                received: received.clone(),
            }),
        );

        let events = vec![
            FromIntegrationMessage::DeviceDiscovered {
                device: Device::new("fridge".to_string(), "Kitchen Fridge".to_string()),
                integration_name: "fake".to_string(),
            },
            FromIntegrationMessage::EntityDiscovered {
                entity_id: FRIDGE.to_string(),
                device_id: Some("fridge".to_string()),
                entity: EntityDescriptor::Thermostat {
                    name: "Fridge".to_string(),
                    range: range(),
                    index: 1,
                },
                integration_name: "fake".to_string(),
            },
            FromIntegrationMessage::EntityDiscovered {
                entity_id: EXPRESS.to_string(),
                device_id: Some("fridge".to_string()),
                entity: EntityDescriptor::Switch {
                    name: "Express Mode".to_string(),
                },
                integration_name: "fake".to_string(),
            },
            FromIntegrationMessage::EntityDiscovered {
                entity_id: DOOR.to_string(),
                device_id: Some("fridge".to_string()),
                entity: EntityDescriptor::ContactSensor {
                    name: "Refrigerator Door Closed".to_string(),
                },
                integration_name: "fake".to_string(),
            },
        ];
        for event in events {
            engine.handle_event(event).await.unwrap();
        }

        (engine, received)
    }

    #[tokio::test]
    async fn test_discovery_populates_state() {
        let (engine, _) = engine_with_entities().await;
        let state = engine.state_snapshot();

        let device = &state.devices["fridge"];
        assert_eq!(device.entity_ids, vec![FRIDGE, EXPRESS, DOOR]);

        let thermostat = &state.thermostats[FRIDGE];
        assert_eq!(thermostat.range, range());
        assert_eq!(thermostat.current_temperature, None);

        assert_eq!(state.entities[FRIDGE].index, Some(1));
        assert_eq!(state.entities[DOOR].kind, EntityKind::ContactSensor);
    }

    #[tokio::test]
    async fn test_state_changes() {
        let (engine, _) = engine_with_entities().await;

        engine
            .handle_event(FromIntegrationMessage::ThermostatStateChanged {
                entity_id: FRIDGE.to_string(),
                current_temperature: 4.0,
                target_temperature: 4.0,
            })
            .await
            .unwrap();
        engine
            .handle_event(FromIntegrationMessage::SwitchStateChanged {
                entity_id: EXPRESS.to_string(),
                on: true,
            })
            .await
            .unwrap();
        engine
            .handle_event(FromIntegrationMessage::ContactSensorStateChanged {
                entity_id: DOOR.to_string(),
                contact_detected: true,
            })
            .await
            .unwrap();

        let state = engine.state_snapshot();
        assert_eq!(state.thermostats[FRIDGE].target_temperature, Some(4.0));
        assert!(state.switches[EXPRESS].on);
        assert!(state.contact_sensors[DOOR].contact_detected);
    }

    #[tokio::test]
    async fn test_state_change_for_undeclared_thermostat_is_ignored() {
        let engine = Engine::new();
        engine
            .handle_event(FromIntegrationMessage::ThermostatStateChanged {
                entity_id: "thermostat.unknown".to_string(),
                current_temperature: 4.0,
                target_temperature: 4.0,
            })
            .await
            .unwrap();
        assert!(engine.state_snapshot().thermostats.is_empty());
    }

    #[tokio::test]
    async fn test_entity_removed() {
        let (engine, _) = engine_with_entities().await;
        engine
            .handle_event(FromIntegrationMessage::EntityRemoved {
                entity_id: EXPRESS.to_string(),
            })
            .await
            .unwrap();

        let state = engine.state_snapshot();
        assert!(!state.entities.contains_key(EXPRESS));
        assert_eq!(state.devices["fridge"].entity_ids, vec![FRIDGE, DOOR]);
        assert_eq!(
            engine.set_switch(EXPRESS, true).await,
            Err(CommandError::UnknownEntity(EXPRESS.to_string()))
        );
    }

    #[tokio::test]
    async fn test_commands_are_routed_and_answered() {
        let (engine, received) = engine_with_entities().await;

        engine.set_target_temperature(FRIDGE, 3.0).await.unwrap();
        engine.set_switch(EXPRESS, true).await.unwrap();
        assert_eq!(
            engine.set_target_temperature(FRIDGE, 5.5).await,
            Err(CommandError::InvalidValue("5.5".to_string()))
        );

        assert_eq!(*received.lock().unwrap(), vec![FRIDGE, EXPRESS, FRIDGE]);
    }

    #[tokio::test]
    async fn test_commands_rejected_before_routing() {
        let (engine, received) = engine_with_entities().await;

        assert_eq!(
            engine.set_target_temperature(FRIDGE, 12.0).await,
            Err(CommandError::OutOfRange {
                value: 12.0,
                min: 1.0,
                max: 7.0
            })
        );
        assert_eq!(
            engine.set_switch(DOOR, true).await,
            Err(CommandError::Unsupported(DOOR.to_string()))
        );
        assert_eq!(
            engine.set_target_temperature("thermostat.nope", 3.0).await,
            Err(CommandError::UnknownEntity("thermostat.nope".to_string()))
        );

        assert!(received.lock().unwrap().is_empty());
    }
}
