//! Minimal client for the Domoticz JSON API.
//!
//! Only two calls are needed: pushing a value into a device (`udevice`) and
//! reading the current value of a setpoint device.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DomoticzError {
    #[error("request to Domoticz failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Domoticz answered with HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Domoticz reported status {0:?} for device {1}")]
    NotOk(Option<String>, String),

    #[error("device {0} has no setpoint value")]
    MissingValue(String),

    #[error("cannot parse setpoint {value:?} of device {idx}")]
    BadSetpoint { idx: String, value: String },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: Option<String>,
    #[serde(default)]
    result: Vec<DeviceInfo>,
}

#[derive(Debug, Deserialize)]
struct DeviceInfo {
    #[serde(rename = "Data")]
    data: Option<String>,
    svalue1: Option<String>,
    #[serde(rename = "SetPoint")]
    set_point: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DomoticzClient {
    http: reqwest::Client,
    base_url: String,
}

impl DomoticzClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, DomoticzError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// Set the value of a device, e.g. a temperature sensor or a setpoint
    pub async fn update_device(&self, idx: &str, svalue: &str, nvalue: i32) -> Result<(), DomoticzError> {
        let nvalue = nvalue.to_string();
        let query = [
            ("type", "command"),
            ("param", "udevice"),
            ("idx", idx),
            ("nvalue", nvalue.as_str()),
            ("svalue", svalue),
        ];
        let response = self.get(&query).await?;
        Self::check_ok(&response, idx)?;
        debug!("Domoticz device {idx} updated to {svalue}");
        Ok(())
    }

    /// Read the value of a setpoint device in °C
    pub async fn get_setpoint(&self, idx: &str) -> Result<f32, DomoticzError> {
        let response = self.get(&[("type", "devices"), ("rid", idx)]).await?;
        Self::check_ok(&response, idx)?;

        let device = response.result.first().ok_or_else(|| DomoticzError::MissingValue(idx.to_string()))?;
        let value = device
            .data
            .as_deref()
            .or(device.svalue1.as_deref())
            .or(device.set_point.as_deref())
            .ok_or_else(|| DomoticzError::MissingValue(idx.to_string()))?;

        parse_setpoint(value).ok_or_else(|| DomoticzError::BadSetpoint { idx: idx.to_string(), value: value.to_string() })
    }

    async fn get(&self, query: &[(&str, &str)]) -> Result<ApiResponse, DomoticzError> {
        let url = format!("{}/json.htm", self.base_url);
        let response = self.http.get(url).query(query).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(DomoticzError::Status(response.status()));
        }
        Ok(response.json::<ApiResponse>().await?)
    }

    fn check_ok(response: &ApiResponse, idx: &str) -> Result<(), DomoticzError> {
        if response.status.as_deref() == Some("OK") {
            Ok(())
        } else {
            Err(DomoticzError::NotOk(response.status.clone(), idx.to_string()))
        }
    }
}

/// Parse a setpoint as Domoticz renders it, with or without a unit: `"25.0 C"` → 25.0
pub fn parse_setpoint(value: &str) -> Option<f32> {
    value.split_whitespace().next()?.parse().ok()
}

#[test]
fn test_parse_setpoint() {
    assert_eq!(parse_setpoint("25.0 C"), Some(25.0));
    assert_eq!(parse_setpoint("-4"), Some(-4.0));
    assert_eq!(parse_setpoint(" 3.5"), Some(3.5));
    assert_eq!(parse_setpoint("cold"), None);
    assert_eq!(parse_setpoint(""), None);
}
