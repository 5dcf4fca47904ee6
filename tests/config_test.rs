use std::io::Write;

use fridgeread::config::{Config, ConfigError};
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[device]
address = "AA:BB:CC:DD:EE:FF"
notification_timeout_secs = 8

[domoticz]
url = "http://192.168.1.123:8080/"
temperature_idx = "62"
setpoint_idx = "61"
poll_interval_secs = 30
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.device.address, "AA:BB:CC:DD:EE:FF");
    assert_eq!(config.device.name, "WT-0001");
    assert_eq!(config.device.notification_timeout().as_secs(), 8);
    assert_eq!(config.device.connect_attempts, 3);

    let domoticz = config.domoticz.unwrap();
    assert_eq!(domoticz.temperature_idx.as_deref(), Some("62"));
    assert_eq!(domoticz.poll_interval().as_secs(), 30);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_load_rejects_zero_poll_interval() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[domoticz]\nurl = \"http://localhost:8080\"\npoll_interval_secs = 0").unwrap();

    let result = Config::load(file.path());
    assert!(matches!(result, Err(ConfigError::Invalid { field: "domoticz.poll_interval_secs", .. })));
}
