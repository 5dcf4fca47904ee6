use super::MessageError;

/// The fridge's echo of a set target temperature command
pub(crate) struct SetTargetMessage(Vec<u8>);

impl SetTargetMessage {
    pub fn new(payload: Vec<u8>) -> Result<Self, MessageError> {
        if payload.is_empty() {
            return Err(MessageError::PayloadTooShort { expected: 1, actual: 0 });
        }
        Ok(Self(payload))
    }

    /// The target temperature the fridge acknowledged in °C
    pub fn target_temp_c(&self) -> i8 {
        self.0[0] as i8
    }
}

#[test]
fn test_set_target_message() {
    assert_eq!(SetTargetMessage::new(vec![0xfe]).unwrap().target_temp_c(), -2);
    assert_eq!(SetTargetMessage::new(vec![0x04, 0x02]).unwrap().target_temp_c(), 4);
    assert!(SetTargetMessage::new(vec![]).is_err());
}
