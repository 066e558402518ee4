use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tracing::debug;

use super::ThinqConfig;
use crate::mapping::ControlPatch;
use crate::mapping::DeviceModel;
use crate::mapping::Snapshot;

/// `deviceType` ThinQ reports for refrigerators.
pub const REFRIGERATOR_DEVICE_TYPE: u32 = 101;

/// Result code of a successful ThinQ call.
const RESULT_OK: &str = "0000";

/// Failure talking to the ThinQ cloud.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ThinQ returned result code {code}")]
    Api { code: String },

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("device {0} has no model document")]
    NoModel(String),
}

/// A device as listed by the account dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub alias: String,
    pub device_type: u32,
    pub model_name: String,
    pub model_json_uri: Option<String>,
    /// State carried alongside the listing
    pub snapshot: Snapshot,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDevice {
    device_id: String,
    #[serde(default)]
    alias: Option<String>,
    device_type: u32,
    #[serde(default)]
    model_name: String,
    #[serde(default)]
    model_json_uri: Option<String>,
}

impl DeviceInfo {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let raw = RawDevice::deserialize(value)?;
        Ok(Self {
            alias: raw.alias.unwrap_or_else(|| raw.model_name.clone()),
            device_id: raw.device_id,
            device_type: raw.device_type,
            model_name: raw.model_name,
            model_json_uri: raw.model_json_uri,
            snapshot: Snapshot::from_device(value),
        })
    }

    pub fn is_refrigerator(&self) -> bool {
        self.device_type == REFRIGERATOR_DEVICE_TYPE
    }
}

/// Trait for ThinQ cloud operations
///
/// This trait allows for mocking the ThinQ client for testing purposes
#[async_trait]
pub trait ThinqClient: Send + Sync {
    /// Every device registered to the account
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError>;

    /// The monitoring value model of a device
    async fn fetch_device_model(&self, device: &DeviceInfo) -> Result<DeviceModel, TransportError>;

    /// Current state of a device
    async fn get_snapshot(&self, device_id: &str) -> Result<Snapshot, TransportError>;

    /// Apply a control patch to a device
    async fn send_control(
        &self,
        device_id: &str,
        patch: &ControlPatch,
    ) -> Result<(), TransportError>;
}

/// Body of a `control-sync` call.
pub(crate) fn control_body(patch: &ControlPatch) -> Result<serde_json::Value, serde_json::Error> {
    let mut body = serde_json::json!({
        "ctrlKey": "basicCtrl",
        "command": "Set",
    });
    if let (Some(body), serde_json::Value::Object(patch)) =
        (body.as_object_mut(), serde_json::to_value(patch)?)
    {
        body.extend(patch);
    }
    Ok(body)
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "resultCode")]
    result_code: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl Envelope {
    fn into_result(self) -> Result<serde_json::Value, TransportError> {
        if self.result_code == RESULT_OK {
            Ok(self.result)
        } else {
            Err(TransportError::Api {
                code: self.result_code,
            })
        }
    }
}

/// ThinQ v2 client using reqwest
pub struct HttpThinqClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpThinqClient {
    /// Create a new client from configuration
    pub fn new(config: &ThinqConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let fixed = [
            ("x-api-key", "VGhpblEyLjAgU0VSVklDRQ=="),
            ("x-thinq-app-ver", "3.6.1200"),
            ("x-thinq-app-type", "NUTS"),
            ("x-thinq-app-level", "PRD"),
            ("x-thinq-app-os", "ANDROID"),
            ("x-thinq-app-logintype", "LGE"),
            ("x-service-code", "SVC202"),
            ("x-service-phase", "OP"),
            ("x-origin", "app-native"),
        ];
        for (name, value) in fixed {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let client_id = config.client_id.as_deref().unwrap_or("thinqd");
        let account = [
            ("x-country-code", config.country.as_str()),
            ("x-language-code", config.language.as_str()),
            ("x-emp-token", config.access_token.as_str()),
            ("x-client-id", client_id),
        ];
        for (name, value) in account {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_str(value)?);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value, TransportError> {
        debug!("GET {}", path);
        let envelope: Envelope = self
            .http
            .get(self.url(path))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result()
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        debug!("POST {} {}", path, body);
        let envelope: Envelope = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result()
    }
}

#[async_trait]
impl ThinqClient for HttpThinqClient {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        let result = self.get("service/application/dashboard").await?;
        let items = result
            .get("item")
            .and_then(|items| items.as_array())
            .cloned()
            .unwrap_or_default();
        items
            .iter()
            .map(|item| DeviceInfo::from_value(item).map_err(TransportError::from))
            .collect()
    }

    async fn fetch_device_model(&self, device: &DeviceInfo) -> Result<DeviceModel, TransportError> {
        let uri = device
            .model_json_uri
            .as_deref()
            .ok_or_else(|| TransportError::NoModel(device.device_id.clone()))?;

        // The model document lives outside the service API and has no envelope.
        let bytes = self
            .http
            .get(uri)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(DeviceModel::from_slice(&bytes)?)
    }

    async fn get_snapshot(&self, device_id: &str) -> Result<Snapshot, TransportError> {
        let device = self.get(&format!("service/devices/{}", device_id)).await?;
        Ok(Snapshot::from_device(&device))
    }

    async fn send_control(
        &self,
        device_id: &str,
        patch: &ControlPatch,
    ) -> Result<(), TransportError> {
        let body = control_body(patch)?;
        self.post(&format!("service/devices/{}/control-sync", device_id), &body)
            .await?;
        Ok(())
    }
}

/// Mock ThinQ client for testing
///
/// Serves devices from JSON documents and records every patch it is sent.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockThinqClient {
    /// Device documents, as returned by the dashboard
    pub devices: std::sync::Mutex<Vec<serde_json::Value>>,
    /// Model documents by model name
    pub models: std::collections::HashMap<String, serde_json::Value>,
    /// Fail every snapshot poll
    pub fail_polls: std::sync::atomic::AtomicBool,
    /// Fail every control call
    pub fail_control: std::sync::atomic::AtomicBool,
    pub sent: std::sync::Mutex<Vec<(String, ControlPatch)>>,
}

#[cfg(test)]
impl MockThinqClient {
    /// A client serving one refrigerator described by `device` and `model`.
    pub fn new(device: serde_json::Value, model: serde_json::Value) -> Self {
        let model_name = device["modelName"].as_str().unwrap_or_default().to_string();
        Self {
            devices: std::sync::Mutex::new(vec![device]),
            models: [(model_name, model)].into_iter().collect(),
            ..Self::default()
        }
    }

    /// Replace the `refState` fields reported for every device.
    pub fn set_state(&self, overrides: serde_json::Value) {
        let mut devices = self.devices.lock().unwrap();
        for device in devices.iter_mut() {
            for (key, value) in overrides.as_object().unwrap() {
                device["snapshot"]["refState"][key] = value.clone();
            }
        }
    }

    /// Mark every device online or offline.
    pub fn set_online(&self, online: bool) {
        let mut devices = self.devices.lock().unwrap();
        for device in devices.iter_mut() {
            device["online"] = online.into();
        }
    }

    pub fn sent(&self) -> Vec<(String, ControlPatch)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ThinqClient for MockThinqClient {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        let devices = self.devices.lock().unwrap();
        devices
            .iter()
            .map(|device| DeviceInfo::from_value(device).map_err(TransportError::from))
            .collect()
    }

    async fn fetch_device_model(&self, device: &DeviceInfo) -> Result<DeviceModel, TransportError> {
        let model = self
            .models
            .get(&device.model_name)
            .ok_or_else(|| TransportError::NoModel(device.device_id.clone()))?;
        Ok(DeviceModel::from_value(model.clone())?)
    }

    async fn get_snapshot(&self, device_id: &str) -> Result<Snapshot, TransportError> {
        use std::sync::atomic::Ordering;

        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                code: "9999".to_string(),
            });
        }
        let devices = self.devices.lock().unwrap();
        let device = devices
            .iter()
            .find(|d| d["deviceId"] == device_id)
            .ok_or_else(|| TransportError::Api {
                code: "0106".to_string(),
            })?;
        Ok(Snapshot::from_device(device))
    }

    async fn send_control(
        &self,
        device_id: &str,
        patch: &ControlPatch,
    ) -> Result<(), TransportError> {
        use std::sync::atomic::Ordering;

        if self.fail_control.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                code: "0106".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_string(), patch.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::STATE_GROUP;
    use crate::mapping::fixtures;

    #[test]
    fn test_device_info_from_dashboard_item() {
        let device = DeviceInfo::from_value(&fixtures::device_json()).unwrap();

        assert_eq!(device.device_id, "6b1d5c3e-2f4a-11ee-be56-0242ac120002");
        assert_eq!(device.alias, "Kitchen Fridge");
        assert_eq!(device.model_name, "GF-B590SV");
        assert!(device.is_refrigerator());
        assert_eq!(device.snapshot, fixtures::snapshot());
    }

    #[test]
    fn test_device_info_without_alias() {
        let device = DeviceInfo::from_value(&serde_json::json!({
            "deviceId": "washer",
            "deviceType": 201,
            "modelName": "F_V8_Y___W.B_2QEUK",
        }))
        .unwrap();

        assert_eq!(device.alias, "F_V8_Y___W.B_2QEUK");
        assert!(!device.is_refrigerator());
        assert!(device.snapshot.is_online());
    }

    #[test]
    fn test_control_body() {
        let mut fields = serde_json::Map::new();
        fields.insert("expressMode".to_string(), "EXPRESS_ON".into());
        fields.insert("tempUnit".to_string(), "CELSIUS".into());
        let patch = ControlPatch::new(STATE_GROUP, fields);

        let body = control_body(&patch).unwrap();
        insta::assert_snapshot!(body.to_string(), @r#"{"ctrlKey":"basicCtrl","command":"Set","dataKey":null,"dataValue":null,"dataSetList":{"refState":{"expressMode":"EXPRESS_ON","tempUnit":"CELSIUS"}},"dataGetList":null}"#);
    }

    #[test]
    fn test_envelope() {
        let ok: Envelope =
            serde_json::from_str(r#"{"resultCode":"0000","result":{"item":[]}}"#).unwrap();
        assert_eq!(ok.into_result().unwrap(), serde_json::json!({"item": []}));

        let err: Envelope = serde_json::from_str(r#"{"resultCode":"0106"}"#).unwrap();
        assert!(matches!(
            err.into_result(),
            Err(TransportError::Api { code }) if code == "0106"
        ));
    }

    #[test]
    fn test_http_client_rejects_bad_token() {
        let config = ThinqConfig {
            base_url: "https://example.invalid/v1".to_string(),
            country: "US".to_string(),
            language: "en-US".to_string(),
            access_token: "bad\ntoken".to_string(),
            client_id: None,
            refresh_interval_secs: 5,
            devices: None,
        };
        assert!(HttpThinqClient::new(&config).is_err());

        let config = ThinqConfig {
            access_token: "token".to_string(),
            ..config
        };
        let client = HttpThinqClient::new(&config).unwrap();
        assert_eq!(
            client.url("service/application/dashboard"),
            "https://example.invalid/v1/service/application/dashboard"
        );
    }
}
