//! Replies the fridge sends on the notify characteristic

mod set_target_message;
mod status_message;

use thiserror::Error;

use crate::command::{QUERY, SET_TARGET};
use crate::frame::Frame;
use crate::fridge_state::FridgeState;
use set_target_message::SetTargetMessage;
use status_message::StatusMessage;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("reply payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },
}

/// A decoded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to a query
    Status(FridgeState),
    /// Acknowledgement of a new target temperature in °C
    TargetSet(i8),
    /// A frame with a command code this crate does not interpret
    Unknown(Frame),
}

impl Reply {
    pub fn decode(frame: Frame) -> Result<Self, MessageError> {
        match frame.command {
            QUERY => Ok(Reply::Status(StatusMessage::new(frame.payload)?.state())),
            SET_TARGET => Ok(Reply::TargetSet(SetTargetMessage::new(frame.payload)?.target_temp_c())),
            _ => Ok(Reply::Unknown(frame)),
        }
    }
}

#[test]
fn test_decode_status() {
    let payload = hex::decode("000114fef9000000000000000000fb570c04").unwrap();
    let reply = Reply::decode(Frame::new(0x01, &payload)).unwrap();
    match reply {
        Reply::Status(state) => {
            assert_eq!(state.actual_temp_c, -5);
            assert_eq!(state.target_temp_c, -7);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn test_decode_target_set() {
    let reply = Reply::decode(Frame::new(0x05, &[0x04])).unwrap();
    assert_eq!(reply, Reply::TargetSet(4));
}

#[test]
fn test_decode_unknown() {
    let frame = Frame::new(0x02, &[0x01, 0x02]);
    assert_eq!(Reply::decode(frame.clone()).unwrap(), Reply::Unknown(frame));
}

#[test]
fn test_decode_short_status() {
    let result = Reply::decode(Frame::new(0x01, &[0x00; 4]));
    assert_eq!(result, Err(MessageError::PayloadTooShort { expected: 18, actual: 4 }));
}
