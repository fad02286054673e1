//! Protocol module - Defines the CCSDS-style telemetry wire protocol
//!
//! Every transmission unit is a frame of 12 bytes, all fields little-endian:
//! - 2 bytes length prefix (always `PACKET_SIZE`)
//! - 6 bytes primary header (packet id, sequence control, data length)
//! - 4 bytes payload (temperature, humidity)

mod header;
mod packet;
mod codec;
mod sequence;

pub use header::*;
pub use packet::*;
pub use codec::*;
pub use sequence::*;

/// CCSDS packet version number emitted by default
pub const CCSDS_VERSION: u8 = 0;

/// Default address the receiver listens on and the transmitter connects to
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:7010";

/// Primary header size in bytes (three 16-bit words)
pub const PRIMARY_HEADER_SIZE: usize = 6;

/// Payload size in bytes (temperature + humidity)
pub const PAYLOAD_SIZE: usize = 4;

/// Serialized packet size
pub const PACKET_SIZE: usize = PRIMARY_HEADER_SIZE + PAYLOAD_SIZE;

/// Length prefix size
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Full frame size on the wire
pub const FRAME_SIZE: usize = LENGTH_PREFIX_SIZE + PACKET_SIZE;
