//! Telemetry packet model
//!
//! A packet is the primary header followed by the temperature/humidity
//! payload, 10 bytes with no padding.

use thiserror::Error;

use super::{PacketId, PrimaryHeader, SequenceControl, PACKET_SIZE, PAYLOAD_SIZE, PRIMARY_HEADER_SIZE};

/// Errors converting raw readings into a payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PacketError {
    #[error("{quantity} reading is not a number: {value}")]
    NotANumber { quantity: &'static str, value: f32 },

    #[error("{quantity} reading does not fit the payload: {value}")]
    OutOfRange { quantity: &'static str, value: f32 },
}

pub type PacketResult<T> = Result<T, PacketError>;

/// Payload carried after the primary header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Measurement {
    /// Degrees Celsius x 100
    pub temperature_centidegrees: i16,
    /// Relative humidity percent x 100
    pub humidity_centipercent: u16,
}

impl Measurement {
    pub fn new(temperature_centidegrees: i16, humidity_centipercent: u16) -> Self {
        Self {
            temperature_centidegrees,
            humidity_centipercent,
        }
    }

    /// Scale a floating point reading into hundredths, rounding to nearest
    pub fn from_reading(temperature_c: f32, humidity_pct: f32) -> PacketResult<Self> {
        let temperature = scale("temperature", temperature_c, i16::MIN.into(), i16::MAX.into())?;
        let humidity = scale("humidity", humidity_pct, u16::MIN.into(), u16::MAX.into())?;

        Ok(Self {
            temperature_centidegrees: temperature as i16,
            humidity_centipercent: humidity as u16,
        })
    }

    pub fn temperature_celsius(&self) -> f32 {
        f32::from(self.temperature_centidegrees) / 100.0
    }

    pub fn humidity_percent(&self) -> f32 {
        f32::from(self.humidity_centipercent) / 100.0
    }

    pub fn to_bytes(&self) -> [u8; PAYLOAD_SIZE] {
        let t = self.temperature_centidegrees.to_le_bytes();
        let h = self.humidity_centipercent.to_le_bytes();
        [t[0], t[1], h[0], h[1]]
    }

    pub fn from_bytes(bytes: &[u8; PAYLOAD_SIZE]) -> Self {
        Self {
            temperature_centidegrees: i16::from_le_bytes([bytes[0], bytes[1]]),
            humidity_centipercent: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

fn scale(quantity: &'static str, value: f32, min: f64, max: f64) -> PacketResult<f64> {
    if !value.is_finite() {
        return Err(PacketError::NotANumber { quantity, value });
    }

    // 60.12f32 is 60.11999..., truncating would give 6011
    let scaled = (f64::from(value) * 100.0).round();
    if scaled < min || scaled > max {
        return Err(PacketError::OutOfRange { quantity, value });
    }
    Ok(scaled)
}

/// A complete telemetry packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryPacket {
    pub header: PrimaryHeader,
    pub measurement: Measurement,
}

impl TelemetryPacket {
    /// Build a packet, filling in the data length for the fixed payload
    pub fn new(packet_id: PacketId, sequence: SequenceControl, measurement: Measurement) -> Self {
        Self {
            header: PrimaryHeader {
                packet_id,
                sequence,
                data_length: (PAYLOAD_SIZE - 1) as u16,
            },
            measurement,
        }
    }

    pub fn serialize(&self) -> [u8; PACKET_SIZE] {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[..PRIMARY_HEADER_SIZE].copy_from_slice(&self.header.to_bytes());
        bytes[PRIMARY_HEADER_SIZE..].copy_from_slice(&self.measurement.to_bytes());
        bytes
    }

    pub fn deserialize(bytes: &[u8; PACKET_SIZE]) -> Self {
        let mut header = [0u8; PRIMARY_HEADER_SIZE];
        let mut payload = [0u8; PAYLOAD_SIZE];
        header.copy_from_slice(&bytes[..PRIMARY_HEADER_SIZE]);
        payload.copy_from_slice(&bytes[PRIMARY_HEADER_SIZE..]);

        Self {
            header: PrimaryHeader::from_bytes(&header),
            measurement: Measurement::from_bytes(&payload),
        }
    }

    /// Whether the header's data length matches the fixed payload
    pub fn has_expected_length(&self) -> bool {
        usize::from(self.header.data_length) + 1 == PAYLOAD_SIZE
    }
}
