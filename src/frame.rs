//! Framing used on both the write and the notify characteristic.
//!
//! Start Byte | End Byte     | Meaning
//! 0          | 1            | A constant header with value [0xFE, 0xFE]
//! 2          | 2            | Length L of the rest of the frame: command + payload + checksum
//! 3          | 3            | The command byte
//! 4          | L            | The payload (L - 3 bytes, possibly empty)
//! L+1        | L+2          | Big endian 16 bit sum of bytes 0..=L

use thiserror::Error;

pub(crate) const HEADER: [u8; 2] = [0xFE, 0xFE];

/// Header + length byte + command byte + checksum
const OVERHEAD: usize = 6;

/// The smallest legal value of the length byte: command + checksum
const MIN_LENGTH_BYTE: u8 = 3;

/// The largest value of the length byte. 0xFE would be indistinguishable
/// from a third header byte.
const MAX_LENGTH_BYTE: u8 = 0xFD;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLong(usize),
}

/// A single command or reply exchanged with the fridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: u8, payload: &[u8]) -> Self {
        Self { command, payload: payload.to_vec() }
    }

    /// Number of bytes this frame occupies on the wire
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + OVERHEAD
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let length = u8::try_from(self.payload.len() + 3)
            .ok()
            .filter(|&l| l <= MAX_LENGTH_BYTE)
            .ok_or(FrameError::PayloadTooLong(self.payload.len()))?;

        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&HEADER);
        bytes.push(length);
        bytes.push(self.command);
        bytes.extend_from_slice(&self.payload);
        let sum = checksum(&bytes);
        bytes.extend_from_slice(&sum.to_be_bytes());
        Ok(bytes)
    }
}

/// Compute the check value for the given bytes
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

#[derive(PartialEq, Eq, Debug)]
pub enum TryParseFrameResult {
    /// A complete frame and the number of buffer bytes it used
    Ok(Frame, usize),
    Incomplete,
    Invalid(&'static str),
}

/// Attempt to parse one frame from the start of the buffer.
///
/// Bytes after the end of the frame are not inspected; the caller is
/// expected to drain `consumed` bytes and try again.
pub fn try_parse_frame(buffer: &[u8]) -> TryParseFrameResult {
    if buffer.len() < 3 {
        return TryParseFrameResult::Incomplete;
    }

    if buffer[0..2] != HEADER {
        return TryParseFrameResult::Invalid("Unexpected header");
    }

    let length = buffer[2];
    if length < MIN_LENGTH_BYTE {
        return TryParseFrameResult::Invalid("Length too short");
    }
    if length > MAX_LENGTH_BYTE {
        return TryParseFrameResult::Invalid("Length too long");
    }

    let frame_len = length as usize + 3;
    if buffer.len() < frame_len {
        return TryParseFrameResult::Incomplete;
    }

    let body = &buffer[..frame_len - 2];
    let sum_actual = u16::from_be_bytes([buffer[frame_len - 2], buffer[frame_len - 1]]);
    if sum_actual != checksum(body) {
        return TryParseFrameResult::Invalid("Checksum mismatch");
    }

    let frame = Frame::new(body[3], &body[4..]);
    TryParseFrameResult::Ok(frame, frame_len)
}

/// Drop bytes from the front of the buffer until it starts with a frame header.
///
/// A trailing lone 0xFE is kept since it may be the first half of a header
/// split across notifications. In a run of 0xFE bytes the header is taken to
/// be the last two of the run. Returns how many bytes were dropped.
pub fn skip_to_header(buffer: &mut Vec<u8>) -> usize {
    let mut start = match buffer.windows(2).position(|w| w == HEADER) {
        Some(pos) => pos,
        None if buffer.last() == Some(&HEADER[0]) => buffer.len() - 1,
        None => buffer.len(),
    };
    while buffer.get(start + 2) == Some(&HEADER[0]) {
        start += 1;
    }
    buffer.drain(..start);
    start
}

#[test]
fn test_encode_query() {
    let frame = Frame::new(0x01, &[]);
    assert_eq!(frame.encode().unwrap(), hex::decode("fefe03010200").unwrap());
}

#[test]
fn test_encode_set_target() {
    let frame = Frame::new(0x05, &[0x04]);
    assert_eq!(frame.encode().unwrap(), hex::decode("fefe0405040209").unwrap());

    let frame = Frame::new(0x05, &[(-2i8) as u8]);
    assert_eq!(frame.encode().unwrap(), hex::decode("fefe0405fe0303").unwrap());
}

#[test]
fn test_encode_payload_too_long() {
    let frame = Frame::new(0x01, &[0u8; 251]);
    assert_eq!(frame.encode(), Err(FrameError::PayloadTooLong(251)));
    assert_eq!(Frame::new(0x01, &[0u8; 253]).encode(), Err(FrameError::PayloadTooLong(253)));
    assert!(Frame::new(0x01, &[0u8; 250]).encode().is_ok());
}

#[test]
fn test_checksum_wraps() {
    assert_eq!(checksum(&[0xFE, 0xFE, 0x03, 0x00]), 0x01FF);
    assert_eq!(checksum(&[0xFF; 258]), 0x00FE);
    assert_eq!(checksum(&[]), 0);
}

#[test]
fn test_try_parse_frame_happy() {
    let message = hex::decode("fefe0405040209").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Ok(Frame::new(0x05, &[0x04]), 7));
}

#[test]
fn test_try_parse_frame_empty_payload() {
    let message = hex::decode("fefe03010200").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Ok(Frame::new(0x01, &[]), 6));
}

#[test]
fn test_try_parse_frame_leaves_trailing_bytes() {
    let message = hex::decode("fefe03010200fefe03").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Ok(Frame::new(0x01, &[]), 6));
}

#[test]
fn test_try_parse_frame_no_header() {
    let message = hex::decode("fefe").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Incomplete);
}

#[test]
fn test_try_parse_frame_incomplete() {
    let message = hex::decode("fefe04050402").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Incomplete);
}

#[test]
fn test_try_parse_frame_bad_header() {
    let message = hex::decode("0103180000").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Invalid("Unexpected header"));
}

#[test]
fn test_try_parse_frame_bad_length() {
    let message = hex::decode("fefe0201").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Invalid("Length too short"));

    let message = hex::decode("fefeff01").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Invalid("Length too long"));
}

#[test]
fn test_try_parse_frame_bad_checksum() {
    let message = hex::decode("fefe0405040208").unwrap();
    let result = try_parse_frame(&message[..]);
    assert_eq!(result, TryParseFrameResult::Invalid("Checksum mismatch"));
}

#[test]
fn test_skip_to_header() {
    let mut buffer = hex::decode("0011fefe0301").unwrap();
    assert_eq!(skip_to_header(&mut buffer), 2);
    assert_eq!(buffer, hex::decode("fefe0301").unwrap());

    let mut buffer = hex::decode("1234fe").unwrap();
    assert_eq!(skip_to_header(&mut buffer), 2);
    assert_eq!(buffer, vec![0xFE]);

    let mut buffer = hex::decode("123456").unwrap();
    assert_eq!(skip_to_header(&mut buffer), 3);
    assert!(buffer.is_empty());

    let mut buffer = hex::decode("fefe03").unwrap();
    assert_eq!(skip_to_header(&mut buffer), 0);
}

#[test]
fn test_skip_to_header_run_of_fe() {
    let mut buffer = hex::decode("12fefefe03010200").unwrap();
    assert_eq!(skip_to_header(&mut buffer), 2);
    assert_eq!(buffer, hex::decode("fefe03010200").unwrap());

    let mut buffer = hex::decode("fefefe").unwrap();
    assert_eq!(skip_to_header(&mut buffer), 1);
    assert_eq!(buffer, hex::decode("fefe").unwrap());
}
