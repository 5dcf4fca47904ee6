use crate::fridge_state::FridgeState;

use super::MessageError;

const TARGET_TEMP_INDEX: usize = 4;
const ACTUAL_TEMP_INDEX: usize = 14;
const BATTERY_PCT_INDEX: usize = 15;
const BATTERY_VOLTAGE_V_INDEX: usize = 16;
const BATTERY_VOLTAGE_DV_INDEX: usize = 17;

/// A reply to a query, carrying temperatures and battery condition.
///
/// Only the fields below are understood; the other bytes hold settings
/// such as lock state, eco mode and the second cooling unit.
pub(crate) struct StatusMessage(Vec<u8>);

impl StatusMessage {
    pub const MIN_LEN: usize = BATTERY_VOLTAGE_DV_INDEX + 1;

    pub fn new(payload: Vec<u8>) -> Result<Self, MessageError> {
        if payload.len() < Self::MIN_LEN {
            return Err(MessageError::PayloadTooShort { expected: Self::MIN_LEN, actual: payload.len() });
        }
        Ok(Self(payload))
    }

    pub fn target_temp_c(&self) -> i8 {
        self.0[TARGET_TEMP_INDEX] as i8
    }

    pub fn actual_temp_c(&self) -> i8 {
        self.0[ACTUAL_TEMP_INDEX] as i8
    }

    pub fn battery_pct(&self) -> u8 {
        self.0[BATTERY_PCT_INDEX]
    }

    pub fn state(&self) -> FridgeState {
        FridgeState {
            actual_temp_c: self.actual_temp_c(),
            target_temp_c: self.target_temp_c(),
            battery_pct: self.battery_pct(),
            battery_voltage_v: self.0[BATTERY_VOLTAGE_V_INDEX],
            battery_voltage_dv: self.0[BATTERY_VOLTAGE_DV_INDEX],
        }
    }
}

#[test]
fn test_status_message() {
    let payload = hex::decode("000114fef9000000000000000000fb570c04").unwrap();
    let message = StatusMessage::new(payload).unwrap();
    assert_eq!(
        message.state(),
        FridgeState {
            actual_temp_c: -5,
            target_temp_c: -7,
            battery_pct: 0x57,
            battery_voltage_v: 12,
            battery_voltage_dv: 4,
        }
    );
}

#[test]
fn test_status_message_extra_bytes_ignored() {
    let payload = hex::decode("0001140004000000000000000000034c0d0200ff00").unwrap();
    let state = StatusMessage::new(payload).unwrap().state();
    assert_eq!(state.target_temp_c, 4);
    assert_eq!(state.actual_temp_c, 3);
    assert_eq!(state.battery_voltage(), "13.2");
}

#[test]
fn test_status_message_too_short() {
    let payload = hex::decode("000114fef9000000000000000000fb570c").unwrap();
    assert_eq!(
        StatusMessage::new(payload).err(),
        Some(MessageError::PayloadTooShort { expected: 18, actual: 17 })
    );
}
