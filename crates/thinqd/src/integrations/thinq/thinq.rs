use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::SendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ThinqConfig;
use super::client::ThinqClient;
use super::refrigerator::Refrigerator;
use crate::engine::CommandError;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::IntegrationError;
use crate::engine::ToIntegrationMessage;

const NAME: &str = "thinq";

/// ThinQ Integration for thinqd
///
/// Bridges LG refrigerators from the ThinQ cloud: discovers them once at
/// setup, polls their state, and turns engine commands into control calls.
pub struct ThinqIntegration<C: ThinqClient> {
    client: Arc<C>,
    config: ThinqConfig,
    /// entity_id -> owning refrigerator
    entities: HashMap<String, Arc<Refrigerator>>,
    /// Handles to the per-device polling tasks
    poll_tasks: Vec<JoinHandle<()>>,
}

impl<C: ThinqClient + 'static> ThinqIntegration<C> {
    /// Create a new ThinQ integration
    pub fn new(client: C, config: &ThinqConfig) -> Self {
        Self {
            client: Arc::new(client),
            config: config.clone(),
            entities: HashMap::new(),
            poll_tasks: Vec::new(),
        }
    }

    /// Discover the account's refrigerators and announce them to the engine.
    async fn discover(
        &mut self,
        tx: &FromIntegrationSender,
    ) -> Result<Vec<Arc<Refrigerator>>, IntegrationError> {
        let devices = self
            .client
            .list_devices()
            .await
            .map_err(|e| -> IntegrationError { Box::new(e) })?;

        let mut refrigerators = Vec::new();
        for device in devices {
            if !device.is_refrigerator() {
                debug!(
                    "Ignoring unsupported device {} (type {})",
                    device.device_id, device.device_type
                );
                continue;
            }
            if !self.config.allows(&device.device_id) {
                info!("Skipping {} (not in allow-list)", device.device_id);
                continue;
            }

            let model = match self.client.fetch_device_model(&device).await {
                Ok(model) => model,
                Err(e) => {
                    warn!("[{}] Failed to load device model: {}", device.device_id, e);
                    continue;
                }
            };

            let fridge = Arc::new(Refrigerator::new(&device, model));
            info!(
                "Discovered refrigerator {} '{}' ({})",
                device.device_id, device.alias, device.model_name
            );

            for msg in fridge.announcements(NAME) {
                send(tx, msg).await;
            }
            for msg in fridge.update(device.snapshot.clone()).await {
                send(tx, msg).await;
            }

            for entity_id in fridge.entity_ids() {
                self.entities.insert(entity_id, fridge.clone());
            }
            refrigerators.push(fridge);
        }

        Ok(refrigerators)
    }

    /// Poll one refrigerator until the engine goes away.
    async fn poll_task(
        client: Arc<C>,
        fridge: Arc<Refrigerator>,
        interval: Duration,
        tx: FromIntegrationSender,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and discovery already reported
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if refresh(client.as_ref(), &fridge, &tx).await.is_err() {
                debug!("[{}] Engine gone, stopping poll", fridge.device_id());
                break;
            }
        }
    }

    fn refrigerator(&self, entity_id: &str) -> Result<&Refrigerator, CommandError> {
        self.entities
            .get(entity_id)
            .map(Arc::as_ref)
            .ok_or_else(|| CommandError::UnknownEntity(entity_id.to_string()))
    }

    async fn set_target_temperature(&self, entity_id: &str, celsius: f64) -> Result<(), CommandError> {
        let fridge = self.refrigerator(entity_id)?;
        let patch = fridge.write_temperature(entity_id, celsius).await?;
        self.client
            .send_control(fridge.device_id(), &patch)
            .await
            .map_err(|e| CommandError::Integration(e.to_string()))
    }

    async fn set_switch(&self, entity_id: &str, on: bool) -> Result<(), CommandError> {
        let fridge = self.refrigerator(entity_id)?;
        let patch = fridge.write_switch(entity_id, on).await?;
        self.client
            .send_control(fridge.device_id(), &patch)
            .await
            .map_err(|e| CommandError::Integration(e.to_string()))
    }
}

/// Fetch a fresh snapshot and forward the changes it carries.
///
/// Transport failures are logged and the cycle skipped; only a closed engine
/// channel is an error.
async fn refresh<C: ThinqClient + ?Sized>(
    client: &C,
    fridge: &Refrigerator,
    tx: &FromIntegrationSender,
) -> Result<(), SendError<FromIntegrationMessage>> {
    let snapshot = match client.get_snapshot(fridge.device_id()).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("[{}] Failed to refresh state: {}", fridge.device_id(), e);
            return Ok(());
        }
    };

    for msg in fridge.update(snapshot).await {
        tx.send(msg).await?;
    }
    Ok(())
}

async fn send(tx: &FromIntegrationSender, msg: FromIntegrationMessage) {
    if let Err(e) = tx.send(msg).await {
        warn!("Failed to send message to engine: {}", e);
    }
}

#[async_trait]
impl<C: ThinqClient + 'static> Integration for ThinqIntegration<C> {
    fn name(&self) -> &str {
        NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), IntegrationError> {
        info!("Connecting to ThinQ at {}", self.config.base_url);
        let refrigerators = self.discover(&tx).await?;
        info!(
            "ThinQ integration bridging {} refrigerator(s)",
            refrigerators.len()
        );

        let interval = Duration::from_secs(self.config.refresh_interval_secs);
        for fridge in refrigerators {
            let task = tokio::spawn(Self::poll_task(
                self.client.clone(),
                fridge,
                interval,
                tx.clone(),
            ));
            self.poll_tasks.push(task);
        }

        Ok(())
    }

    async fn handle_command(&mut self, command: ToIntegrationMessage) -> Result<(), IntegrationError> {
        match command {
            ToIntegrationMessage::SetTargetTemperature {
                entity_id,
                celsius,
                reply,
            } => {
                info!("Setting {} to {} °C", entity_id, celsius);
                let result = self.set_target_temperature(&entity_id, celsius).await;
                if let Err(e) = &result {
                    warn!("Rejected write to {}: {}", entity_id, e);
                }
                let _ = reply.send(result);
            }
            ToIntegrationMessage::SetSwitch {
                entity_id,
                on,
                reply,
            } => {
                info!("Turning {} {}", entity_id, if on { "on" } else { "off" });
                let result = self.set_switch(&entity_id, on).await;
                if let Err(e) = &result {
                    warn!("Rejected write to {}: {}", entity_id, e);
                }
                let _ = reply.send(result);
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), IntegrationError> {
        info!("ThinQ integration shutting down");
        for task in self.poll_tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::sync::oneshot;

    use super::*;
    use crate::engine::Engine;
    use crate::engine::EntityDescriptor;
    use crate::integrations::thinq::client::MockThinqClient;
    use crate::mapping::STATE_GROUP;
    use crate::mapping::fixtures;

    const ID: &str = "6b1d5c3e-2f4a-11ee-be56-0242ac120002";

    fn config() -> ThinqConfig {
        ThinqConfig {
            base_url: "https://example.invalid/v1/".to_string(),
            country: "US".to_string(),
            language: "en-US".to_string(),
            access_token: "token".to_string(),
            client_id: None,
            refresh_interval_secs: 5,
            devices: None,
        }
    }

    fn mock() -> MockThinqClient {
        let model: serde_json::Value = serde_json::from_str(fixtures::MODEL_JSON).unwrap();
        MockThinqClient::new(fixtures::device_json(), model)
    }

    fn drain(rx: &mut mpsc::Receiver<FromIntegrationMessage>) -> Vec<FromIntegrationMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    async fn set_up(
        client: MockThinqClient,
        config: &ThinqConfig,
    ) -> (
        ThinqIntegration<MockThinqClient>,
        mpsc::Receiver<FromIntegrationMessage>,
    ) {
        let (tx, rx) = mpsc::channel(64);
        let mut integration = ThinqIntegration::new(client, config);
        integration.setup(tx).await.unwrap();
        (integration, rx)
    }

    fn fridge_temperature(messages: &[FromIntegrationMessage]) -> Option<f64> {
        messages.iter().find_map(|msg| match msg {
            FromIntegrationMessage::ThermostatStateChanged {
                entity_id,
                target_temperature,
                ..
            } if entity_id.ends_with("_fridge") => Some(*target_temperature),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_setup_announces_and_reports() {
        let (integration, mut rx) = set_up(mock(), &config()).await;
        let messages = drain(&mut rx);

        // Device, five entities, five initial values
        assert_eq!(messages.len(), 11);
        assert!(matches!(
            &messages[0],
            FromIntegrationMessage::DeviceDiscovered { device, integration_name }
                if device.id == ID && integration_name == "thinq"
        ));
        assert!(matches!(
            &messages[1],
            FromIntegrationMessage::EntityDiscovered {
                entity: EntityDescriptor::Thermostat { index: 1, .. },
                ..
            }
        ));
        assert_eq!(fridge_temperature(&messages), Some(4.0));
        assert_eq!(integration.entities.len(), 5);
    }

    #[tokio::test]
    async fn test_setup_honours_allow_list() {
        let config = ThinqConfig {
            devices: Some(vec!["someone-else".to_string()]),
            ..config()
        };
        let (integration, mut rx) = set_up(mock(), &config).await;

        assert!(drain(&mut rx).is_empty());
        assert!(integration.entities.is_empty());
    }

    #[tokio::test]
    async fn test_setup_skips_other_device_types() {
        let client = mock();
        client.devices.lock().unwrap().push(json!({
            "deviceId": "washer",
            "alias": "Washer",
            "deviceType": 201,
            "modelName": "F_V8_Y___W.B_2QEUK",
        }));
        let (integration, _rx) = set_up(client, &config()).await;

        assert!(integration.entities.keys().all(|id| id.contains(ID)));
    }

    #[tokio::test]
    async fn test_refresh_reports_changes() {
        let (integration, mut rx) = set_up(mock(), &config()).await;
        drain(&mut rx);

        integration.client.set_state(json!({ "fridgeTemp": "2" }));
        let fridge = integration.entities[&format!("thermostat.{}_fridge", ID)].clone();
        let (tx, mut rx) = mpsc::channel(64);
        refresh(integration.client.as_ref(), &fridge, &tx).await.unwrap();

        assert_eq!(fridge_temperature(&drain(&mut rx)), Some(6.0));
    }

    #[tokio::test]
    async fn test_refresh_offline_keeps_values() {
        let (integration, mut rx) = set_up(mock(), &config()).await;
        drain(&mut rx);

        integration.client.set_state(json!({ "fridgeTemp": "7" }));
        integration.client.set_online(false);
        let fridge = integration.entities[&format!("thermostat.{}_fridge", ID)].clone();
        let (tx, mut rx) = mpsc::channel(64);
        refresh(integration.client.as_ref(), &fridge, &tx).await.unwrap();

        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_offline_cycle_keeps_engine_state() {
        let (integration, mut rx) = set_up(mock(), &config()).await;
        let engine = Engine::new();
        for msg in drain(&mut rx) {
            engine.handle_event(msg).await.unwrap();
        }

        let fridge_id = format!("thermostat.{}_fridge", ID);
        let door_id = format!("contact_sensor.{}_door", ID);
        let target = |engine: &Engine| engine.state_snapshot().thermostats[&fridge_id].target_temperature;
        assert_eq!(target(&engine), Some(4.0));

        // Offline with a different set point and an open door
        integration
            .client
            .set_state(json!({ "fridgeTemp": "7", "atLeastOneDoorOpen": "OPEN" }));
        integration.client.set_online(false);
        let fridge = integration.entities[&fridge_id].clone();
        let (tx, mut rx) = mpsc::channel(64);
        refresh(integration.client.as_ref(), &fridge, &tx).await.unwrap();
        for msg in drain(&mut rx) {
            engine.handle_event(msg).await.unwrap();
        }

        assert_eq!(target(&engine), Some(4.0));
        let state = engine.state_snapshot();
        assert!(state.contact_sensors[&door_id].contact_detected);
        assert_eq!(state.thermostats[&fridge_id].current_temperature, Some(4.0));

        // Back online, the pending values land
        integration.client.set_online(true);
        refresh(integration.client.as_ref(), &fridge, &tx).await.unwrap();
        for msg in drain(&mut rx) {
            engine.handle_event(msg).await.unwrap();
        }

        assert_eq!(target(&engine), Some(1.0));
        assert!(!engine.state_snapshot().contact_sensors[&door_id].contact_detected);
    }

    #[tokio::test]
    async fn test_refresh_failure_skips_cycle() {
        let (integration, mut rx) = set_up(mock(), &config()).await;
        drain(&mut rx);

        integration.client.fail_polls.store(true, Ordering::SeqCst);
        let fridge = integration.entities[&format!("thermostat.{}_fridge", ID)].clone();
        let (tx, mut rx) = mpsc::channel(64);
        refresh(integration.client.as_ref(), &fridge, &tx).await.unwrap();

        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_set_target_temperature_sends_patch() {
        let (mut integration, _rx) = set_up(mock(), &config()).await;

        let (reply, rx) = oneshot::channel();
        integration
            .handle_command(ToIntegrationMessage::SetTargetTemperature {
                entity_id: format!("thermostat.{}_freezer", ID),
                celsius: -20.0,
                reply,
            })
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), Ok(()));

        let sent = integration.client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ID);
        assert_eq!(sent[0].1.get(STATE_GROUP, "freezerTemp"), Some("7"));
        assert_eq!(sent[0].1.get(STATE_GROUP, "tempUnit"), Some("CELSIUS"));
    }

    #[tokio::test]
    async fn test_invalid_value_is_rejected_without_control_call() {
        let (mut integration, _rx) = set_up(mock(), &config()).await;

        let (reply, rx) = oneshot::channel();
        integration
            .handle_command(ToIntegrationMessage::SetTargetTemperature {
                entity_id: format!("thermostat.{}_fridge", ID),
                celsius: 999.0,
                reply,
            })
            .await
            .unwrap();

        assert!(matches!(rx.await.unwrap(), Err(CommandError::InvalidValue(_))));
        assert!(integration.client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_set_switch_and_transport_failure() {
        let (mut integration, _rx) = set_up(mock(), &config()).await;

        let (reply, rx) = oneshot::channel();
        integration
            .handle_command(ToIntegrationMessage::SetSwitch {
                entity_id: format!("switch.{}_eco_friendly", ID),
                on: false,
                reply,
            })
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), Ok(()));
        assert_eq!(
            integration.client.sent()[0].1.get(STATE_GROUP, "ecoFriendly"),
            Some("OFF")
        );

        integration.client.fail_control.store(true, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        integration
            .handle_command(ToIntegrationMessage::SetSwitch {
                entity_id: format!("switch.{}_express_mode", ID),
                on: true,
                reply,
            })
            .await
            .unwrap();
        assert!(matches!(rx.await.unwrap(), Err(CommandError::Integration(_))));
    }
}
