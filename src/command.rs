use crate::frame::{Frame, FrameError};

/// Pairing handshake. The fridge works without it but some firmwares want it once.
pub(crate) const BIND: u8 = 0x00;
/// Request a status report. Answered with a frame carrying the same code.
pub(crate) const QUERY: u8 = 0x01;
/// Set the target temperature of the (first) cooling unit. The fridge echoes the frame.
pub(crate) const SET_TARGET: u8 = 0x05;

/// The commands this crate knows how to send to the fridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Bind,
    Query,
    /// Target temperature in °C
    SetTarget(i8),
}

impl Command {
    pub fn code(&self) -> u8 {
        match self {
            Command::Bind => BIND,
            Command::Query => QUERY,
            Command::SetTarget(_) => SET_TARGET,
        }
    }

    /// The command code of the notification the fridge answers with, if any
    pub fn reply_code(&self) -> Option<u8> {
        match self {
            Command::Bind => None,
            Command::Query => Some(QUERY),
            Command::SetTarget(_) => Some(SET_TARGET),
        }
    }

    pub fn to_frame(&self) -> Frame {
        match self {
            Command::Bind | Command::Query => Frame::new(self.code(), &[]),
            Command::SetTarget(temp) => Frame::new(self.code(), &temp.to_le_bytes()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        self.to_frame().encode()
    }
}

#[test]
fn test_bind() {
    assert_eq!(Command::Bind.encode().unwrap(), hex::decode("fefe030001ff").unwrap());
    assert_eq!(Command::Bind.reply_code(), None);
}

#[test]
fn test_query() {
    assert_eq!(Command::Query.encode().unwrap(), hex::decode("fefe03010200").unwrap());
    assert_eq!(Command::Query.reply_code(), Some(0x01));
}

#[test]
fn test_set_target_signed() {
    assert_eq!(Command::SetTarget(4).encode().unwrap(), hex::decode("fefe0405040209").unwrap());
    assert_eq!(Command::SetTarget(-2).encode().unwrap(), hex::decode("fefe0405fe0303").unwrap());
    assert_eq!(Command::SetTarget(-20).to_frame().payload, vec![0xEC]);
    assert_eq!(Command::SetTarget(0).reply_code(), Some(0x05));
}
