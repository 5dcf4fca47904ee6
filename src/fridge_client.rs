//! BLE client for WT-0001 fridge controllers.
//!
//! The controller exposes a write characteristic taking command frames and a
//! notify characteristic on which it answers. Replies to a query may arrive
//! split over several notifications, and unrelated frames (echoes of earlier
//! commands, periodic status pushes) can be interleaved, so notifications are
//! buffered until a complete frame with the expected command code is seen.

use anyhow::anyhow;
use bluest::Adapter;
use bluest::AdvertisingDevice;
use bluest::Characteristic;
use bluest::Device;
use bluest::Uuid;
use futures_util::Stream;
use futures_util::StreamExt;
use tokio::time::timeout;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::DeviceSettings;
use crate::frame::{self, Frame, TryParseFrameResult};
use crate::fridge_state::FridgeState;
use crate::message::Reply;

pub struct FridgeClient {
    adapter: Adapter,
    device: Device,
    write: Characteristic,
    notify: Characteristic,
    settings: DeviceSettings,
}

impl FridgeClient {
    /// Disconnect from the fridge
    pub async fn stop(self) -> anyhow::Result<()> {
        self.adapter.disconnect_device(&self.device).await?;
        info!("Disconnected from fridge");
        Ok(())
    }

    pub async fn new_default() -> anyhow::Result<Self> {
        Self::new(DeviceSettings::default()).await
    }

    /// Create a new `FridgeClient`, which includes discovering and connecting to the device.
    pub async fn new(settings: DeviceSettings) -> anyhow::Result<Self> {
        let write_id = settings.write_characteristic_id()?;
        let notify_id = settings.notify_characteristic_id()?;

        let adapter = bluest::Adapter::default()
            .await
            .ok_or(anyhow!("Default adapter not found"))?;
        adapter.wait_available().await?;

        let device = timeout(settings.scan_timeout(), Self::discover_device(&settings, &adapter))
            .await
            .map_err(|_| anyhow!("Device {} not found", settings.address))??;

        Self::connect_with_retry(&adapter, &device.device, &settings).await?;

        let write = Self::find_characteristic(&device.device, write_id).await?;
        let notify = Self::find_characteristic(&device.device, notify_id).await?;

        Ok(Self { adapter, device: device.device, write, notify, settings })
    }

    /// Read the current state from the fridge
    pub async fn fetch_state(&mut self) -> anyhow::Result<FridgeState> {
        self.try_connect().await?;

        match self.request_response(Command::Query).await? {
            Reply::Status(state) => Ok(state),
            other => Err(anyhow!("Unexpected reply to query: {other:?}")),
        }
    }

    /// Set the target temperature, then read the state back to confirm it.
    pub async fn set_target_temperature(&mut self, temp_c: i8) -> anyhow::Result<FridgeState> {
        self.try_connect().await?;

        info!("Setting target temperature to {temp_c}°C");
        match self.request_response(Command::SetTarget(temp_c)).await {
            Ok(Reply::TargetSet(echo)) if echo == temp_c => debug!("Target temperature acknowledged"),
            Ok(other) => warn!("Unexpected acknowledgement of target temperature: {other:?}"),
            Err(err) => warn!("No acknowledgement of target temperature: {err}"),
        }

        tokio::time::sleep(self.settings.settle_delay()).await;

        let state = self.fetch_state().await?;
        if state.target_temp_c != temp_c {
            warn!("Fridge reports target {}°C after requesting {temp_c}°C", state.target_temp_c);
        }
        Ok(state)
    }

    /// Send the pairing handshake. No reply is expected.
    pub async fn bind(&mut self) -> anyhow::Result<()> {
        self.try_connect().await?;
        self.send(Command::Bind).await
    }

    async fn discover_device(settings: &DeviceSettings, adapter: &Adapter) -> anyhow::Result<AdvertisingDevice> {
        let mut adapter_events = adapter.scan(&[]).await?;
        while let Some(device) = adapter_events.next().await {
            let id = device.device.id().to_string();
            let name = device
                .adv_data
                .local_name
                .clone()
                .or_else(|| device.device.name().ok());
            debug!("Discovered {id} {name:?}");

            if Self::is_target(&id, name.as_deref(), settings) {
                info!("Found fridge {id}");
                return Ok(device);
            }
        }

        Err(anyhow!("Device {} not found", settings.address))
    }

    /// Match by MAC address where the platform exposes it, otherwise by advertised name.
    ///
    /// Windows ids carry the adapter address as well as the device address, so any
    /// address in the id matching is enough.
    fn is_target(id: &str, name: Option<&str>, settings: &DeviceSettings) -> bool {
        let addresses = mac_addresses(id);
        if addresses.is_empty() {
            name == Some(settings.name.as_str())
        } else {
            addresses.iter().any(|a| a.eq_ignore_ascii_case(&settings.address))
        }
    }

    async fn connect_with_retry(adapter: &Adapter, device: &Device, settings: &DeviceSettings) -> anyhow::Result<()> {
        let attempts = settings.connect_attempts.max(1);
        for attempt in 1..=attempts {
            info!("Connecting to {} (attempt {attempt}/{attempts})", settings.address);
            match adapter.connect_device(device).await {
                Ok(()) => {
                    info!("Connected to {}", settings.address);
                    return Ok(());
                }
                Err(err) if attempt < attempts => {
                    warn!("Failed to connect: {err}");
                    tokio::time::sleep(settings.connect_retry_delay()).await;
                }
                Err(err) => return Err(anyhow!("Could not connect after {attempts} attempts: {err}")),
            }
        }

        Err(anyhow!("Could not connect to {}", settings.address))
    }

    async fn find_characteristic(device: &Device, id: Uuid) -> anyhow::Result<Characteristic> {
        for service in device.discover_services().await? {
            if let Some(c) = service.discover_characteristics_with_uuid(id).await?.first() {
                return Ok(c.clone());
            }
        }

        Err(anyhow!("The device does not have characteristic {id}"))
    }

    async fn send(&self, command: Command) -> anyhow::Result<()> {
        let rq = command.encode()?;

        let h = hex::encode(&rq);
        debug!("FRIDGE: TX: {h}");

        self.write.write(&rq).await?;
        Ok(())
    }

    async fn request_response(&mut self, command: Command) -> anyhow::Result<Reply> {
        let expected = command.reply_code().ok_or(anyhow!("{command:?} has no reply"))?;

        let reader = self.notify.notify().await?;

        self.send(command).await?;

        let frame = Self::read_frame(reader, expected, self.settings.notification_timeout()).await?;

        Ok(Reply::decode(frame)?)
    }

    /// Read notifications until a complete frame with the `expected` command code arrives.
    ///
    /// Frames with other command codes are dropped, as are bytes that do not
    /// start a frame. On an invalid frame the search for a header resumes one
    /// byte further on, so the read only fails on timeout or end of stream.
    async fn read_frame<T: Stream<Item = Result<Vec<u8>, bluest::Error>> + Send + Unpin>(
        mut reader: T,
        expected: u8,
        idle_timeout: Duration,
    ) -> anyhow::Result<Frame> {
        let mut msg = Vec::<u8>::new();
        loop {
            let read_result = timeout(idle_timeout, reader.next()).await;

            match read_result {
                Err(_) => {
                    let h_msg = hex::encode(&msg[..]);
                    return Err(anyhow!("Timed out waiting for reply 0x{expected:02x}: {h_msg}"));
                }
                Ok(None) => {
                    debug!("FRIDGE: End of notification stream");
                    return Err(anyhow!("end of notification stream"));
                }
                Ok(Some(Ok(data))) => {
                    let h_notification = hex::encode(&data);
                    debug!("FRIDGE: RX notification: 0x{h_notification}");

                    msg.extend_from_slice(&data);
                }
                Ok(Some(Err(err))) => {
                    warn!("FRIDGE: Notification error: {err}");
                    return Err(err.into());
                }
            }

            loop {
                let dropped = frame::skip_to_header(&mut msg);
                if dropped > 0 {
                    debug!("FRIDGE: Skipped {dropped} bytes before frame header");
                }

                match frame::try_parse_frame(&msg[..]) {
                    TryParseFrameResult::Ok(frame, consumed) => {
                        msg.drain(..consumed);
                        if frame.command == expected {
                            return Ok(frame);
                        }
                        debug!("FRIDGE: Ignoring frame 0x{:02x}", frame.command);
                    }
                    TryParseFrameResult::Incomplete => break,
                    TryParseFrameResult::Invalid(e) => {
                        let h_msg = hex::encode(&msg[..]);
                        warn!("FRIDGE: Frame invalid: {e}: {h_msg}");
                        msg.drain(..1);
                    }
                }
            }
        }
    }

    async fn try_connect(&self) -> anyhow::Result<()> {
        if !self.device.is_connected().await {
            Self::connect_with_retry(&self.adapter, &self.device, &self.settings).await?;
        }

        Ok(())
    }
}

/// Every `xx:xx:xx:xx:xx:xx` substring of a device id
fn mac_addresses(id: &str) -> Vec<&str> {
    const MAC_LEN: usize = 17;
    id.as_bytes()
        .windows(MAC_LEN)
        .enumerate()
        .filter(|(_, w)| {
            w.iter().enumerate().all(|(i, b)| if i % 3 == 2 { *b == b':' } else { b.is_ascii_hexdigit() })
        })
        .map(|(i, _)| &id[i..i + MAC_LEN])
        .collect()
}

#[cfg(test)]
fn notifications(chunks: &[&str]) -> impl Stream<Item = Result<Vec<u8>, bluest::Error>> + Send + Unpin {
    let items: Vec<Result<Vec<u8>, bluest::Error>> = chunks.iter().map(|c| Ok(hex::decode(c).unwrap())).collect();
    futures_util::stream::iter(items)
}

#[cfg(test)]
fn status_frame() -> String {
    let payload = hex::decode("0001140004000000000000000000034c0d02").unwrap();
    hex::encode(Frame::new(0x01, &payload).encode().unwrap())
}

#[test]
fn test_status_frame_fixture() {
    assert!(status_frame().starts_with("fefe1501"));
}

#[tokio::test]
async fn test_read_frame_single_notification() {
    let reader = notifications(&[&status_frame()]);
    let frame = FridgeClient::read_frame(reader, 0x01, Duration::from_secs(1)).await.unwrap();
    assert_eq!(frame.command, 0x01);
    assert_eq!(frame.payload.len(), 18);
}

#[tokio::test]
async fn test_read_frame_split_notifications() {
    let whole = status_frame();
    let (a, b) = whole.split_at(14);
    let reader = notifications(&[a, b]);
    let frame = FridgeClient::read_frame(reader, 0x01, Duration::from_secs(1)).await.unwrap();
    match Reply::decode(frame).unwrap() {
        Reply::Status(state) => {
            assert_eq!(state.target_temp_c, 4);
            assert_eq!(state.actual_temp_c, 3);
            assert_eq!(state.battery_pct, 0x4c);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn test_read_frame_skips_other_frames_and_garbage() {
    let status = status_frame();
    let reader = notifications(&["0011", "fefe0405040209", &status]);
    let frame = FridgeClient::read_frame(reader, 0x01, Duration::from_secs(1)).await.unwrap();
    assert_eq!(frame.command, 0x01);
}

#[tokio::test]
async fn test_read_frame_two_frames_in_one_notification() {
    let both = format!("fefe0405040209{}", status_frame());
    let reader = notifications(&[&both]);
    let frame = FridgeClient::read_frame(reader, 0x05, Duration::from_secs(1)).await.unwrap();
    assert_eq!(frame, Frame::new(0x05, &[0x04]));
}

#[tokio::test]
async fn test_read_frame_bad_checksum() {
    let reader = notifications(&["fefe0405040208"]);
    let result = FridgeClient::read_frame(reader, 0x05, Duration::from_secs(1)).await;
    assert_eq!(result.unwrap_err().to_string(), "end of notification stream");
}

#[tokio::test]
async fn test_read_frame_recovers_after_bad_checksum() {
    let reader = notifications(&["fefe0405040208", "fefe0405040209"]);
    let frame = FridgeClient::read_frame(reader, 0x05, Duration::from_secs(1)).await.unwrap();
    assert_eq!(frame, Frame::new(0x05, &[0x04]));
}

#[tokio::test]
async fn test_read_frame_garbage_ending_in_header_byte() {
    let status = status_frame();
    let reader = notifications(&["12fe", &status]);
    let frame = FridgeClient::read_frame(reader, 0x01, Duration::from_secs(1)).await.unwrap();
    assert_eq!(frame.payload.len(), 18);
}

#[tokio::test]
async fn test_read_frame_header_inside_corrupt_frame() {
    // A truncated query echo whose remaining bytes run into the real reply
    let corrupt = format!("fefe0301{}", status_frame());
    let reader = notifications(&[&corrupt]);
    let frame = FridgeClient::read_frame(reader, 0x01, Duration::from_secs(1)).await.unwrap();
    assert_eq!(frame.payload.len(), 18);
}

#[tokio::test]
async fn test_read_frame_end_of_stream() {
    let reader = notifications(&["fefe0405"]);
    let result = FridgeClient::read_frame(reader, 0x05, Duration::from_secs(1)).await;
    assert_eq!(result.unwrap_err().to_string(), "end of notification stream");
}

#[tokio::test]
async fn test_read_frame_timeout() {
    let reader = futures_util::stream::pending::<Result<Vec<u8>, bluest::Error>>();
    let result = FridgeClient::read_frame(reader, 0x01, Duration::from_millis(10)).await;
    assert!(result.unwrap_err().to_string().starts_with("Timed out"));
}

#[test]
fn test_is_target() {
    let settings = DeviceSettings::default();
    assert!(FridgeClient::is_target("hci0/07:4d:fb:a7:c4:5e", None, &settings));
    assert!(FridgeClient::is_target("5B1C2A3D-0000-4E8F-9A6B-3C2D1E0F9A8B", Some("WT-0001"), &settings));
    assert!(!FridgeClient::is_target("5B1C2A3D-0000-4E8F-9A6B-3C2D1E0F9A8B", Some("Other"), &settings));
    assert!(!FridgeClient::is_target("11:22:33:44:55:66", Some("Other"), &settings));
}

#[test]
fn test_is_target_address_wins_over_name() {
    let settings = DeviceSettings { address: "AA:BB:CC:DD:EE:FF".to_string(), ..DeviceSettings::default() };
    assert!(!FridgeClient::is_target("hci0/07:4D:FB:A7:C4:5E", Some("WT-0001"), &settings));
    assert!(FridgeClient::is_target("hci0/aa:bb:cc:dd:ee:ff", Some("WT-0001"), &settings));
    assert!(FridgeClient::is_target(
        "BluetoothLE#BluetoothLE00:1a:7d:da:71:13-aa:bb:cc:dd:ee:ff",
        None,
        &settings
    ));
    assert!(!FridgeClient::is_target(
        "BluetoothLE#BluetoothLE00:1a:7d:da:71:13-07:4d:fb:a7:c4:5e",
        Some("WT-0001"),
        &settings
    ));
}

#[test]
fn test_mac_addresses() {
    assert_eq!(mac_addresses("hci0/07:4D:FB:A7:C4:5E"), vec!["07:4D:FB:A7:C4:5E"]);
    assert!(mac_addresses("5B1C2A3D-0000-4E8F-9A6B-3C2D1E0F9A8B").is_empty());
    assert!(mac_addresses("07:4D:FB:A7:C4").is_empty());
}
