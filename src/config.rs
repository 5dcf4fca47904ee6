//! Optional TOML configuration.
//!
//! ```toml
//! [device]
//! address = "07:4D:FB:A7:C4:5E"
//! connect_attempts = 3
//!
//! [domoticz]
//! url = "http://192.168.1.123:8080"
//! temperature_idx = "62"
//! setpoint_idx = "61"
//! poll_interval_secs = 10
//! ```

use std::path::Path;
use std::time::Duration;

use bluest::Uuid;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub device: DeviceSettings,
    pub domoticz: Option<DomoticzSettings>,
}

/// Where to find the fridge and how patient to be with it
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSettings {
    /// MAC address of the fridge
    pub address: String,
    /// Advertised name, used when the platform hides MAC addresses
    pub name: String,
    pub write_characteristic: String,
    pub notify_characteristic: String,
    pub scan_timeout_secs: u64,
    pub connect_attempts: u32,
    pub connect_retry_delay_secs: u64,
    /// How long to wait for the next notification before giving up on a reply
    pub notification_timeout_secs: u64,
    /// Pause between setting a target and reading it back
    pub settle_delay_millis: u64,
}

impl DeviceSettings {
    pub const DEFAULT_ADDRESS: &'static str = "07:4D:FB:A7:C4:5E";
    pub const DEFAULT_NAME: &'static str = "WT-0001";
    pub const WRITE_CHARACTERISTIC_ID: &'static str = "00001235-0000-1000-8000-00805f9b34fb";
    pub const NOTIFY_CHARACTERISTIC_ID: &'static str = "00001236-0000-1000-8000-00805f9b34fb";

    pub fn write_characteristic_id(&self) -> Result<Uuid, ConfigError> {
        parse_uuid("write_characteristic", &self.write_characteristic)
    }

    pub fn notify_characteristic_id(&self) -> Result<Uuid, ConfigError> {
        parse_uuid("notify_characteristic", &self.notify_characteristic)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_millis)
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            address: Self::DEFAULT_ADDRESS.to_string(),
            name: Self::DEFAULT_NAME.to_string(),
            write_characteristic: Self::WRITE_CHARACTERISTIC_ID.to_string(),
            notify_characteristic: Self::NOTIFY_CHARACTERISTIC_ID.to_string(),
            scan_timeout_secs: 30,
            connect_attempts: 3,
            connect_retry_delay_secs: 5,
            notification_timeout_secs: 5,
            settle_delay_millis: 1000,
        }
    }
}

/// Connection to a Domoticz server mirroring the fridge
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DomoticzSettings {
    pub url: String,
    /// Temperature sensor device receiving the measured temperature
    pub temperature_idx: Option<String>,
    /// Setpoint device mirroring, and controlling, the target temperature
    pub setpoint_idx: Option<String>,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl DomoticzSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DomoticzSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            temperature_idx: None,
            setpoint_idx: None,
            poll_interval_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.write_characteristic_id()?;
        self.device.notify_characteristic_id()?;

        if self.device.connect_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "device.connect_attempts",
                message: "must be at least 1".to_string(),
            });
        }

        if let Some(domoticz) = &self.domoticz {
            if domoticz.url.trim().is_empty() {
                return Err(ConfigError::Invalid { field: "domoticz.url", message: "must not be empty".to_string() });
            }
            if domoticz.poll_interval_secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "domoticz.poll_interval_secs",
                    message: "must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ConfigError> {
    Uuid::parse_str(value).map_err(|e| ConfigError::Invalid { field, message: e.to_string() })
}

#[test]
fn test_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.device, DeviceSettings::default());
    assert_eq!(config.device.address, "07:4D:FB:A7:C4:5E");
    assert_eq!(config.device.name, "WT-0001");
    assert_eq!(
        config.device.write_characteristic_id().unwrap(),
        Uuid::from_u128(0x00001235_0000_1000_8000_00805f9b34fb)
    );
    assert_eq!(
        config.device.notify_characteristic_id().unwrap(),
        Uuid::from_u128(0x00001236_0000_1000_8000_00805f9b34fb)
    );
    assert!(config.domoticz.is_none());
}

#[test]
fn test_partial_sections() {
    let config = Config::parse(
        r#"
        [device]
        connect_attempts = 5

        [domoticz]
        url = "http://192.168.1.123:8080"
        setpoint_idx = "61"
        "#,
    )
    .unwrap();
    assert_eq!(config.device.connect_attempts, 5);
    assert_eq!(config.device.address, DeviceSettings::DEFAULT_ADDRESS);

    let domoticz = config.domoticz.unwrap();
    assert_eq!(domoticz.setpoint_idx.as_deref(), Some("61"));
    assert_eq!(domoticz.temperature_idx, None);
    assert_eq!(domoticz.poll_interval(), Duration::from_secs(10));
}

#[test]
fn test_invalid_uuid() {
    let result = Config::parse("[device]\nwrite_characteristic = \"not-a-uuid\"\n");
    assert!(matches!(result, Err(ConfigError::Invalid { field: "write_characteristic", .. })));
}

#[test]
fn test_zero_attempts_rejected() {
    let result = Config::parse("[device]\nconnect_attempts = 0\n");
    assert!(matches!(result, Err(ConfigError::Invalid { field: "device.connect_attempts", .. })));
}

#[test]
fn test_malformed_toml() {
    assert!(matches!(Config::parse("[device"), Err(ConfigError::Parse(_))));
}
