//! Primary header codec
//!
//! Packs and unpacks the bit fields of the two identification words of the
//! primary header. Field widths are enforced when the typed values are built,
//! so encoding itself is total.

use std::fmt;

use thiserror::Error;

const VERSION_SHIFT: u16 = 13;
const VERSION_MASK: u16 = 0x07;
const PACKET_TYPE_SHIFT: u16 = 12;
const SECONDARY_HEADER_SHIFT: u16 = 11;
const PROCESS_ID_MASK: u16 = 0x07FF;

const SEQUENCE_FLAGS_SHIFT: u16 = 14;
const SEQUENCE_FLAGS_MASK: u16 = 0x03;
const SEQUENCE_COUNT_MASK: u16 = 0x3FFF;

/// Largest valid version number (3 bits)
pub const MAX_VERSION: u8 = VERSION_MASK as u8;

/// Largest valid process id (11 bits)
pub const MAX_PROCESS_ID: u16 = PROCESS_ID_MASK;

/// Largest valid sequence count (14 bits)
pub const MAX_SEQUENCE_COUNT: u16 = SEQUENCE_COUNT_MASK;

/// Header construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("{field} out of range: {value} (max: {max})")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

pub type HeaderResult<T> = Result<T, HeaderError>;

/// Packet type bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Telemetry = 0,
    Telecommand = 1,
}

impl PacketType {
    fn from_bit(bit: u16) -> Self {
        if bit & 0x1 == 0 {
            PacketType::Telemetry
        } else {
            PacketType::Telecommand
        }
    }
}

/// Sequence flags describing where a packet sits in a segmented group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SequenceFlags {
    Continuation = 0,
    First = 1,
    Last = 2,
    /// Standalone packet, not part of a group
    Unsegmented = 3,
}

impl SequenceFlags {
    fn from_bits(bits: u16) -> Self {
        match bits & SEQUENCE_FLAGS_MASK {
            0 => SequenceFlags::Continuation,
            1 => SequenceFlags::First,
            2 => SequenceFlags::Last,
            _ => SequenceFlags::Unsegmented,
        }
    }
}

/// Identification word: version | type | secondary header flag | process id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketId {
    version: u8,
    packet_type: PacketType,
    secondary_header: bool,
    process_id: u16,
}

impl PacketId {
    pub fn new(
        version: u8,
        packet_type: PacketType,
        secondary_header: bool,
        process_id: u16,
    ) -> HeaderResult<Self> {
        if version > MAX_VERSION {
            return Err(HeaderError::FieldOutOfRange {
                field: "version",
                value: version.into(),
                max: MAX_VERSION.into(),
            });
        }
        if process_id > MAX_PROCESS_ID {
            return Err(HeaderError::FieldOutOfRange {
                field: "process_id",
                value: process_id.into(),
                max: MAX_PROCESS_ID.into(),
            });
        }

        Ok(Self {
            version,
            packet_type,
            secondary_header,
            process_id,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn secondary_header(&self) -> bool {
        self.secondary_header
    }

    pub fn process_id(&self) -> u16 {
        self.process_id
    }
}

/// Sequence word: sequence flags | sequence count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceControl {
    pub(super) flags: SequenceFlags,
    pub(super) count: u16,
}

impl SequenceControl {
    pub fn new(flags: SequenceFlags, count: u16) -> HeaderResult<Self> {
        if count > MAX_SEQUENCE_COUNT {
            return Err(HeaderError::FieldOutOfRange {
                field: "sequence_count",
                value: count.into(),
                max: MAX_SEQUENCE_COUNT.into(),
            });
        }
        Ok(Self { flags, count })
    }

    pub fn flags(&self) -> SequenceFlags {
        self.flags
    }

    pub fn count(&self) -> u16 {
        self.count
    }
}

/// Pack a packet id into its 16-bit word
pub fn encode_packet_id(id: &PacketId) -> u16 {
    ((u16::from(id.version) & VERSION_MASK) << VERSION_SHIFT)
        | ((id.packet_type as u16 & 0x1) << PACKET_TYPE_SHIFT)
        | ((u16::from(id.secondary_header) & 0x1) << SECONDARY_HEADER_SHIFT)
        | (id.process_id & PROCESS_ID_MASK)
}

/// Unpack a 16-bit packet id word. Every word is valid.
pub fn decode_packet_id(word: u16) -> PacketId {
    PacketId {
        version: ((word >> VERSION_SHIFT) & VERSION_MASK) as u8,
        packet_type: PacketType::from_bit(word >> PACKET_TYPE_SHIFT),
        secondary_header: (word >> SECONDARY_HEADER_SHIFT) & 0x1 == 1,
        process_id: word & PROCESS_ID_MASK,
    }
}

/// Pack sequence control into its 16-bit word
pub fn encode_sequence_control(seq: &SequenceControl) -> u16 {
    ((seq.flags as u16 & SEQUENCE_FLAGS_MASK) << SEQUENCE_FLAGS_SHIFT)
        | (seq.count & SEQUENCE_COUNT_MASK)
}

/// Unpack a 16-bit sequence control word. Every word is valid.
pub fn decode_sequence_control(word: u16) -> SequenceControl {
    SequenceControl {
        flags: SequenceFlags::from_bits(word >> SEQUENCE_FLAGS_SHIFT),
        count: word & SEQUENCE_COUNT_MASK,
    }
}

/// The full 6-byte primary header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryHeader {
    pub packet_id: PacketId,
    pub sequence: SequenceControl,
    /// Payload length minus one
    pub data_length: u16,
}

impl PrimaryHeader {
    pub fn to_bytes(&self) -> [u8; super::PRIMARY_HEADER_SIZE] {
        let mut bytes = [0u8; super::PRIMARY_HEADER_SIZE];
        bytes[0..2].copy_from_slice(&encode_packet_id(&self.packet_id).to_le_bytes());
        bytes[2..4].copy_from_slice(&encode_sequence_control(&self.sequence).to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data_length.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; super::PRIMARY_HEADER_SIZE]) -> Self {
        Self {
            packet_id: decode_packet_id(u16::from_le_bytes([bytes[0], bytes[1]])),
            sequence: decode_sequence_control(u16::from_le_bytes([bytes[2], bytes[3]])),
            data_length: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }
}

impl fmt::Display for PrimaryHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version={} type={:?} pid={} secondary={} flags={:?} seq={} len={}",
            self.packet_id.version,
            self.packet_id.packet_type,
            self.packet_id.process_id,
            self.packet_id.secondary_header,
            self.sequence.flags,
            self.sequence.count,
            self.data_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FLAGS: [SequenceFlags; 4] = [
        SequenceFlags::Continuation,
        SequenceFlags::First,
        SequenceFlags::Last,
        SequenceFlags::Unsegmented,
    ];

    #[test]
    fn test_packet_id_known_value() {
        let id = PacketId::new(0, PacketType::Telemetry, true, 1).unwrap();
        assert_eq!(encode_packet_id(&id), 0x0801);
    }

    #[test]
    fn test_packet_id_field_positions() {
        let id = PacketId::new(7, PacketType::Telecommand, false, 0).unwrap();
        assert_eq!(encode_packet_id(&id), 0xF000);

        let id = PacketId::new(0, PacketType::Telemetry, false, MAX_PROCESS_ID).unwrap();
        assert_eq!(encode_packet_id(&id), 0x07FF);
    }

    #[test]
    fn test_packet_id_roundtrip_exhaustive() {
        for version in 0..=MAX_VERSION {
            for packet_type in [PacketType::Telemetry, PacketType::Telecommand] {
                for secondary_header in [false, true] {
                    for process_id in 0..=MAX_PROCESS_ID {
                        let id =
                            PacketId::new(version, packet_type, secondary_header, process_id)
                                .unwrap();
                        assert_eq!(decode_packet_id(encode_packet_id(&id)), id);
                    }
                }
            }
        }
    }

    #[test]
    fn test_type_and_secondary_flag_decoded_from_word() {
        let id = decode_packet_id(0x1800);
        assert_eq!(id.packet_type(), PacketType::Telecommand);
        assert!(id.secondary_header());
        assert_eq!(id.version(), 0);
        assert_eq!(id.process_id(), 0);
    }

    #[test]
    fn test_sequence_control_known_value() {
        let seq = SequenceControl::new(SequenceFlags::Unsegmented, 0).unwrap();
        assert_eq!(encode_sequence_control(&seq), 0xC000);
    }

    #[test]
    fn test_sequence_control_roundtrip_exhaustive() {
        for flags in ALL_FLAGS {
            for count in 0..=MAX_SEQUENCE_COUNT {
                let seq = SequenceControl::new(flags, count).unwrap();
                assert_eq!(decode_sequence_control(encode_sequence_control(&seq)), seq);
            }
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(
            PacketId::new(8, PacketType::Telemetry, false, 0),
            Err(HeaderError::FieldOutOfRange {
                field: "version",
                value: 8,
                max: 7
            })
        );
        assert!(PacketId::new(0, PacketType::Telemetry, false, 0x0800).is_err());
        assert!(SequenceControl::new(SequenceFlags::First, 0x4000).is_err());
    }

    #[test]
    fn test_primary_header_bytes() {
        let header = PrimaryHeader {
            packet_id: PacketId::new(0, PacketType::Telemetry, true, 1).unwrap(),
            sequence: SequenceControl::new(SequenceFlags::Unsegmented, 0).unwrap(),
            data_length: 3,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x01, 0x08, 0x00, 0xC0, 0x03, 0x00]);
        assert_eq!(PrimaryHeader::from_bytes(&bytes), header);
    }
}
