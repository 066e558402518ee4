use std::borrow::Cow;

use super::STATE_GROUP;

/// One point-in-time state record of a refrigerator.
///
/// Holds the raw codes of the `refState` group as delivered by ThinQ. The
/// presence of optional keys (e.g. `expressFridge`) is meaningful on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    online: bool,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            online: true,
            fields: serde_json::Map::new(),
        }
    }
}

impl Snapshot {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>, online: bool) -> Self {
        Self { online, fields }
    }

    /// Build a snapshot from a ThinQ device object:
    ///
    /// ```json
    /// { "online": true, "snapshot": { "refState": { "fridgeTemp": "4", ... }, "online": true } }
    /// ```
    ///
    /// A device is online unless either `online` flag says otherwise.
    pub fn from_device(device: &serde_json::Value) -> Self {
        let snapshot = device.get("snapshot");
        let fields = snapshot
            .and_then(|s| s.get(STATE_GROUP))
            .and_then(|s| s.as_object())
            .cloned()
            .unwrap_or_default();

        let device_online = device.get("online").and_then(|v| v.as_bool());
        let snapshot_online = snapshot
            .and_then(|s| s.get("online"))
            .and_then(|v| v.as_bool());
        let online = device_online.unwrap_or(true) && snapshot_online.unwrap_or(true);

        Self { online, fields }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Raw code of a field. Numbers and booleans are rendered as strings;
    /// `null` counts as absent.
    pub fn field(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.fields.get(key)? {
            serde_json::Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            serde_json::Value::Number(n) => Some(Cow::Owned(n.to_string())),
            serde_json::Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }
}
