//! Frame codec for telemetry packets
//!
//! Handles length-prefixed framing of packets on a continuous byte stream.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{TelemetryPacket, FRAME_SIZE, LENGTH_PREFIX_SIZE, PACKET_SIZE};

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Bad length prefix: {found} (expected: {expected})")]
    BadLength { found: u16, expected: u16 },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Write a packet as a frame into a buffer
pub fn encode(packet: &TelemetryPacket, buf: &mut BytesMut) {
    buf.reserve(FRAME_SIZE);
    buf.put_u16_le(PACKET_SIZE as u16);
    buf.put_slice(&packet.serialize());
}

/// Encode a packet as a fixed-size frame
pub fn encode_frame(packet: &TelemetryPacket) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[..LENGTH_PREFIX_SIZE].copy_from_slice(&(PACKET_SIZE as u16).to_le_bytes());
    frame[LENGTH_PREFIX_SIZE..].copy_from_slice(&packet.serialize());
    frame
}

/// Reassembly state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeState {
    #[default]
    AwaitingLength,
    AwaitingBody {
        expected_len: usize,
    },
}

/// Reassembles packets from a byte stream that may arrive in fragments
#[derive(Debug, Default)]
pub struct Decoder {
    state: DecodeState,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::AwaitingLength,
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Drop any partially read frame
    pub fn reset(&mut self) {
        self.state = DecodeState::AwaitingLength;
    }

    /// Attempt to decode a packet from the buffer.
    /// Returns Ok(None) if more data is needed.
    ///
    /// On a bad length prefix only the two prefix bytes are consumed and the
    /// decoder is left waiting for the next prefix.
    pub fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<TelemetryPacket>> {
        loop {
            match self.state {
                DecodeState::AwaitingLength => {
                    if buf.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }

                    let length = buf.get_u16_le();
                    if usize::from(length) != PACKET_SIZE {
                        return Err(CodecError::BadLength {
                            found: length,
                            expected: PACKET_SIZE as u16,
                        });
                    }

                    self.state = DecodeState::AwaitingBody {
                        expected_len: usize::from(length),
                    };
                }
                DecodeState::AwaitingBody { expected_len } => {
                    if buf.len() < expected_len {
                        return Ok(None);
                    }

                    let mut body = [0u8; PACKET_SIZE];
                    buf.copy_to_slice(&mut body);
                    self.state = DecodeState::AwaitingLength;

                    return Ok(Some(TelemetryPacket::deserialize(&body)));
                }
            }
        }
    }
}
