//! Message types for the Glint configuration protocol
//!
//! Every message is a type byte followed by a fixed-layout payload,
//! little-endian. Acknowledgements carry the outcome of the requested
//! mutation as a single status byte.

use heapless::Vec;

// Message type IDs: app → die
pub const MSG_TRANSFER_SETTINGS: u8 = 0x10;
pub const MSG_PROGRAM_DEFAULT_PARAMETERS: u8 = 0x12;
pub const MSG_SET_DESIGN_AND_COLOR: u8 = 0x14;
pub const MSG_SET_CURRENT_BEHAVIOR: u8 = 0x16;
pub const MSG_SET_NAME: u8 = 0x18;
pub const MSG_PRINT_NORMALS: u8 = 0x1A;
pub const MSG_BULK_SETUP: u8 = 0x20;
pub const MSG_BULK_DATA: u8 = 0x22;

// Message type IDs: die → app
pub const MSG_TRANSFER_SETTINGS_ACK: u8 = 0x11;
pub const MSG_TRANSFER_SETTINGS_FINISHED: u8 = 0x13;
pub const MSG_PROGRAM_DEFAULT_PARAMETERS_FINISHED: u8 = 0x15;
pub const MSG_SET_DESIGN_AND_COLOR_ACK: u8 = 0x17;
pub const MSG_SET_CURRENT_BEHAVIOR_ACK: u8 = 0x19;
pub const MSG_SET_NAME_ACK: u8 = 0x1B;
pub const MSG_BULK_SETUP_ACK: u8 = 0x21;
pub const MSG_BULK_DATA_ACK: u8 = 0x23;

/// Largest bulk-transfer chunk carried in one message
pub const MAX_BULK_CHUNK: usize = 64;

/// Largest device name carried in a SetName payload
pub const MAX_NAME_BYTES: usize = 15;

/// Largest complete encoded message (type byte + BulkData payload)
pub const MAX_MESSAGE_SIZE: usize = 1 + 2 + 1 + MAX_BULK_CHUNK;

/// Errors from message encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// Type byte does not name a known message
    UnknownType,
    /// Payload shorter than the fixed layout requires
    Truncated,
    /// Variable-length field exceeds its bound
    PayloadTooLarge,
    /// Field value outside its valid range
    InvalidPayload,
}

/// Messages from the companion app to the die
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostMessage {
    /// Start a full settings download (erase, ack, then bulk data)
    TransferSettings,
    /// Reset tuning parameters to firmware defaults
    ProgramDefaultParameters,
    /// Select the appearance
    SetDesignAndColor { design: u8 },
    /// Select the active behavior program
    SetCurrentBehavior { behavior: u8 },
    /// Rename the die
    SetName { name: Vec<u8, MAX_NAME_BYTES> },
    /// Log one face's calibration normal (debug builds)
    PrintNormals { face: u8 },
    /// Announce an incoming bulk transfer of `size` bytes
    BulkSetup { size: u16 },
    /// One chunk of the bulk transfer
    BulkData {
        offset: u16,
        data: Vec<u8, MAX_BULK_CHUNK>,
    },
}

impl HostMessage {
    /// Decode a message from a received packet
    pub fn decode(packet: &[u8]) -> Result<Self, MessageError> {
        let (&msg_type, payload) = packet.split_first().ok_or(MessageError::Truncated)?;
        match msg_type {
            MSG_TRANSFER_SETTINGS => Ok(HostMessage::TransferSettings),
            MSG_PROGRAM_DEFAULT_PARAMETERS => Ok(HostMessage::ProgramDefaultParameters),
            MSG_SET_DESIGN_AND_COLOR => {
                let design = *payload.first().ok_or(MessageError::Truncated)?;
                Ok(HostMessage::SetDesignAndColor { design })
            }
            MSG_SET_CURRENT_BEHAVIOR => {
                let behavior = *payload.first().ok_or(MessageError::Truncated)?;
                Ok(HostMessage::SetCurrentBehavior { behavior })
            }
            MSG_SET_NAME => {
                // Payload: [len][name bytes]
                let (&len, rest) = payload.split_first().ok_or(MessageError::Truncated)?;
                let len = len as usize;
                if len > MAX_NAME_BYTES {
                    return Err(MessageError::PayloadTooLarge);
                }
                let bytes = rest.get(..len).ok_or(MessageError::Truncated)?;
                let mut name = Vec::new();
                name.extend_from_slice(bytes)
                    .map_err(|_| MessageError::PayloadTooLarge)?;
                Ok(HostMessage::SetName { name })
            }
            MSG_PRINT_NORMALS => {
                let face = *payload.first().ok_or(MessageError::Truncated)?;
                Ok(HostMessage::PrintNormals { face })
            }
            MSG_BULK_SETUP => {
                let bytes = payload.get(..2).ok_or(MessageError::Truncated)?;
                Ok(HostMessage::BulkSetup {
                    size: u16::from_le_bytes([bytes[0], bytes[1]]),
                })
            }
            MSG_BULK_DATA => {
                // Payload: [offset u16][len][chunk bytes]
                let header = payload.get(..3).ok_or(MessageError::Truncated)?;
                let offset = u16::from_le_bytes([header[0], header[1]]);
                let len = header[2] as usize;
                if len > MAX_BULK_CHUNK {
                    return Err(MessageError::PayloadTooLarge);
                }
                let bytes = payload.get(3..3 + len).ok_or(MessageError::Truncated)?;
                let mut data = Vec::new();
                data.extend_from_slice(bytes)
                    .map_err(|_| MessageError::PayloadTooLarge)?;
                Ok(HostMessage::BulkData { offset, data })
            }
            _ => Err(MessageError::UnknownType),
        }
    }

    /// Encode this message into a packet (for tests and simulation)
    pub fn encode(&self) -> Result<Vec<u8, MAX_MESSAGE_SIZE>, MessageError> {
        let mut packet = Vec::new();
        let push = |packet: &mut Vec<u8, MAX_MESSAGE_SIZE>, byte: u8| {
            packet.push(byte).map_err(|_| MessageError::PayloadTooLarge)
        };
        match self {
            HostMessage::TransferSettings => push(&mut packet, MSG_TRANSFER_SETTINGS)?,
            HostMessage::ProgramDefaultParameters => {
                push(&mut packet, MSG_PROGRAM_DEFAULT_PARAMETERS)?
            }
            HostMessage::SetDesignAndColor { design } => {
                push(&mut packet, MSG_SET_DESIGN_AND_COLOR)?;
                push(&mut packet, *design)?;
            }
            HostMessage::SetCurrentBehavior { behavior } => {
                push(&mut packet, MSG_SET_CURRENT_BEHAVIOR)?;
                push(&mut packet, *behavior)?;
            }
            HostMessage::SetName { name } => {
                push(&mut packet, MSG_SET_NAME)?;
                push(&mut packet, name.len() as u8)?;
                packet
                    .extend_from_slice(name)
                    .map_err(|_| MessageError::PayloadTooLarge)?;
            }
            HostMessage::PrintNormals { face } => {
                push(&mut packet, MSG_PRINT_NORMALS)?;
                push(&mut packet, *face)?;
            }
            HostMessage::BulkSetup { size } => {
                push(&mut packet, MSG_BULK_SETUP)?;
                packet
                    .extend_from_slice(&size.to_le_bytes())
                    .map_err(|_| MessageError::PayloadTooLarge)?;
            }
            HostMessage::BulkData { offset, data } => {
                push(&mut packet, MSG_BULK_DATA)?;
                packet
                    .extend_from_slice(&offset.to_le_bytes())
                    .map_err(|_| MessageError::PayloadTooLarge)?;
                push(&mut packet, data.len() as u8)?;
                packet
                    .extend_from_slice(data)
                    .map_err(|_| MessageError::PayloadTooLarge)?;
            }
        }
        Ok(packet)
    }
}

/// Messages from the die to the companion app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DieMessage {
    /// Settings region erased; ready for bulk data
    TransferSettingsAck,
    /// Full settings download complete
    TransferSettingsFinished,
    ProgramDefaultParametersFinished { success: bool },
    SetDesignAndColorAck { success: bool },
    SetCurrentBehaviorAck { success: bool },
    SetNameAck { success: bool },
    BulkSetupAck,
    /// Chunk at `offset` landed in flash
    BulkDataAck { offset: u16 },
}

impl DieMessage {
    /// Encode this message into a packet
    pub fn encode(&self) -> Vec<u8, MAX_MESSAGE_SIZE> {
        let mut packet = Vec::new();
        // Infallible: every DieMessage is far below MAX_MESSAGE_SIZE
        let _ = match self {
            DieMessage::TransferSettingsAck => packet.push(MSG_TRANSFER_SETTINGS_ACK),
            DieMessage::TransferSettingsFinished => packet.push(MSG_TRANSFER_SETTINGS_FINISHED),
            DieMessage::ProgramDefaultParametersFinished { success } => {
                let _ = packet.push(MSG_PROGRAM_DEFAULT_PARAMETERS_FINISHED);
                packet.push(*success as u8)
            }
            DieMessage::SetDesignAndColorAck { success } => {
                let _ = packet.push(MSG_SET_DESIGN_AND_COLOR_ACK);
                packet.push(*success as u8)
            }
            DieMessage::SetCurrentBehaviorAck { success } => {
                let _ = packet.push(MSG_SET_CURRENT_BEHAVIOR_ACK);
                packet.push(*success as u8)
            }
            DieMessage::SetNameAck { success } => {
                let _ = packet.push(MSG_SET_NAME_ACK);
                packet.push(*success as u8)
            }
            DieMessage::BulkSetupAck => packet.push(MSG_BULK_SETUP_ACK),
            DieMessage::BulkDataAck { offset } => {
                let _ = packet.push(MSG_BULK_DATA_ACK);
                let _ = packet.push(offset.to_le_bytes()[0]);
                packet.push(offset.to_le_bytes()[1])
            }
        };
        packet
    }

    /// Decode a die message (for tests and host tooling)
    pub fn decode(packet: &[u8]) -> Result<Self, MessageError> {
        let (&msg_type, payload) = packet.split_first().ok_or(MessageError::Truncated)?;
        let status = |payload: &[u8]| -> Result<bool, MessageError> {
            match payload.first() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                Some(_) => Err(MessageError::InvalidPayload),
                None => Err(MessageError::Truncated),
            }
        };
        match msg_type {
            MSG_TRANSFER_SETTINGS_ACK => Ok(DieMessage::TransferSettingsAck),
            MSG_TRANSFER_SETTINGS_FINISHED => Ok(DieMessage::TransferSettingsFinished),
            MSG_PROGRAM_DEFAULT_PARAMETERS_FINISHED => {
                Ok(DieMessage::ProgramDefaultParametersFinished {
                    success: status(payload)?,
                })
            }
            MSG_SET_DESIGN_AND_COLOR_ACK => Ok(DieMessage::SetDesignAndColorAck {
                success: status(payload)?,
            }),
            MSG_SET_CURRENT_BEHAVIOR_ACK => Ok(DieMessage::SetCurrentBehaviorAck {
                success: status(payload)?,
            }),
            MSG_SET_NAME_ACK => Ok(DieMessage::SetNameAck {
                success: status(payload)?,
            }),
            MSG_BULK_SETUP_ACK => Ok(DieMessage::BulkSetupAck),
            MSG_BULK_DATA_ACK => {
                let bytes = payload.get(..2).ok_or(MessageError::Truncated)?;
                Ok(DieMessage::BulkDataAck {
                    offset: u16::from_le_bytes([bytes[0], bytes[1]]),
                })
            }
            _ => Err(MessageError::UnknownType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_settings_is_bare() {
        let packet = HostMessage::TransferSettings.encode().unwrap();
        assert_eq!(&packet[..], &[MSG_TRANSFER_SETTINGS]);
        assert_eq!(
            HostMessage::decode(&packet).unwrap(),
            HostMessage::TransferSettings
        );
    }

    #[test]
    fn test_set_name_layout() {
        let mut name = Vec::new();
        name.extend_from_slice(b"ROLLY").unwrap();
        let packet = HostMessage::SetName { name }.encode().unwrap();
        assert_eq!(packet[0], MSG_SET_NAME);
        assert_eq!(packet[1], 5);
        assert_eq!(&packet[2..7], b"ROLLY");
    }

    #[test]
    fn test_set_name_rejects_oversized_length() {
        let mut packet = [0u8; 2];
        packet[0] = MSG_SET_NAME;
        packet[1] = (MAX_NAME_BYTES + 1) as u8;
        assert_eq!(
            HostMessage::decode(&packet),
            Err(MessageError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_bulk_data_roundtrip() {
        let mut data = Vec::new();
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let original = HostMessage::BulkData {
            offset: 0x1234,
            data,
        };
        let packet = original.encode().unwrap();
        assert_eq!(packet[0], MSG_BULK_DATA);
        assert_eq!(&packet[1..3], &[0x34, 0x12]); // little-endian offset
        assert_eq!(packet[3], 8);
        assert_eq!(HostMessage::decode(&packet).unwrap(), original);
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        assert_eq!(
            HostMessage::decode(&[MSG_SET_DESIGN_AND_COLOR]),
            Err(MessageError::Truncated)
        );
        assert_eq!(
            HostMessage::decode(&[MSG_BULK_SETUP, 0x00]),
            Err(MessageError::Truncated)
        );
        assert_eq!(HostMessage::decode(&[]), Err(MessageError::Truncated));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert_eq!(HostMessage::decode(&[0xEE]), Err(MessageError::UnknownType));
        assert_eq!(DieMessage::decode(&[0xEE]), Err(MessageError::UnknownType));
    }

    #[test]
    fn test_ack_status_byte() {
        let packet = DieMessage::SetNameAck { success: true }.encode();
        assert_eq!(&packet[..], &[MSG_SET_NAME_ACK, 1]);

        let packet = DieMessage::SetDesignAndColorAck { success: false }.encode();
        assert_eq!(&packet[..], &[MSG_SET_DESIGN_AND_COLOR_ACK, 0]);
        assert_eq!(
            DieMessage::decode(&packet).unwrap(),
            DieMessage::SetDesignAndColorAck { success: false }
        );
    }

    #[test]
    fn test_bulk_data_ack_roundtrip() {
        let packet = DieMessage::BulkDataAck { offset: 640 }.encode();
        assert_eq!(
            DieMessage::decode(&packet).unwrap(),
            DieMessage::BulkDataAck { offset: 640 }
        );
    }
}
