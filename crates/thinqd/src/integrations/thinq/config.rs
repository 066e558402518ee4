use serde::Deserialize;

fn default_base_url() -> String {
    "https://eic-service.lgthinq.com:46030/v1/".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    5
}

/// Configuration for the ThinQ integration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Root of the ThinQ v2 service API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Two-letter country code of the account (e.g. "US")
    pub country: String,

    /// Language tag of the account (e.g. "en-US")
    pub language: String,

    /// OAuth access token of the account
    pub access_token: String,

    /// Client id registered with the service
    #[serde(default)]
    pub client_id: Option<String>,

    /// Seconds between state polls
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Only bridge these device ids. All refrigerators when unset.
    #[serde(default)]
    pub devices: Option<Vec<String>>,
}

impl Config {
    pub fn allows(&self, device_id: &str) -> bool {
        self.devices
            .as_ref()
            .is_none_or(|ids| ids.iter().any(|id| id == device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str(
            r#"
            country = "US"
            language = "en-US"
            access_token = "token"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://eic-service.lgthinq.com:46030/v1/");
        assert_eq!(config.refresh_interval_secs, 5);
        assert!(config.allows("anything"));
    }

    #[test]
    fn test_allow_list() {
        let config: Config = toml::from_str(
            r#"
            country = "US"
            language = "en-US"
            access_token = "token"
            devices = ["fridge-1"]
            "#,
        )
        .unwrap();

        assert!(config.allows("fridge-1"));
        assert!(!config.allows("fridge-2"));
    }
}
