//! Receiving end of the link
//!
//! Buffers whatever bytes the transport yields, drains the decoder, logs
//! each packet and hands its measurement to the display sink.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{LinkError, LinkResult};
use crate::display::DisplaySink;
use crate::protocol::{self, CodecError, DecodeState, Decoder, TelemetryPacket};

/// Consumer statistics
#[derive(Debug, Default, Clone)]
pub struct ConsumerStats {
    /// Packets decoded
    pub packets_received: u64,
    /// Bad length prefixes dropped
    pub framing_errors: u64,
    /// Times the sequence count jumped forward
    pub sequence_gaps: u64,
    /// Packets missing according to the sequence count
    pub packets_lost: u64,
    /// Times the sequence count went back to zero unexpectedly
    pub restarts: u64,
    /// Bytes read from the link
    pub bytes_received: u64,
}

/// Reassembles packets from a byte stream and renders them
pub struct Consumer<D: DisplaySink> {
    decoder: Decoder,
    read_buf: BytesMut,
    sink: D,
    last_sequence: Option<u16>,
    stats: ConsumerStats,
}

impl<D: DisplaySink> Consumer<D> {
    pub fn new(sink: D) -> Self {
        Self {
            decoder: Decoder::new(),
            read_buf: BytesMut::with_capacity(4096),
            sink,
            last_sequence: None,
            stats: ConsumerStats::default(),
        }
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Bytes buffered but not yet part of a decoded packet
    pub fn pending(&self) -> usize {
        self.read_buf.len()
    }

    pub fn decoder_state(&self) -> DecodeState {
        self.decoder.state()
    }

    /// Start a new session: drop buffered bytes and sequence history
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.read_buf.clear();
        self.last_sequence = None;
    }

    /// Append bytes read from the transport
    pub fn push(&mut self, bytes: &[u8]) {
        self.read_buf.extend_from_slice(bytes);
        self.stats.bytes_received += bytes.len() as u64;
    }

    /// Decode everything currently buffered. Never waits for more bytes.
    /// Returns the packets decoded by this call.
    pub fn poll(&mut self) -> Vec<TelemetryPacket> {
        self.poll_until(None)
    }

    /// Like `poll`, but stops once `limit` packets were received in total.
    /// Bytes past that point stay buffered.
    pub fn poll_until(&mut self, limit: Option<u64>) -> Vec<TelemetryPacket> {
        let mut packets = Vec::new();
        while !self.limit_reached(limit) {
            match self.decoder.decode(&mut self.read_buf) {
                Ok(Some(packet)) => {
                    self.handle_packet(&packet);
                    packets.push(packet);
                }
                Ok(None) => break,
                Err(CodecError::BadLength { found, expected }) => {
                    self.stats.framing_errors += 1;
                    tracing::warn!("Bad length: {} (expected {}), dropping prefix", found, expected);
                }
            }
        }
        packets
    }

    /// Read from `reader` until it closes or `limit` packets were decoded
    pub async fn run<R>(&mut self, reader: &mut R, limit: Option<u64>) -> LinkResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 4096];
        while !self.limit_reached(limit) {
            let n = reader.read(&mut buf).await?;

            if n == 0 {
                if self.read_buf.is_empty() && self.decoder.state() == DecodeState::AwaitingLength {
                    return Ok(()); // Clean close
                }
                return Err(LinkError::Closed {
                    pending: self.read_buf.len(),
                });
            }

            self.push(&buf[..n]);
            self.poll_until(limit);
        }
        Ok(())
    }

    fn limit_reached(&self, limit: Option<u64>) -> bool {
        limit.is_some_and(|n| self.stats.packets_received >= n)
    }

    fn handle_packet(&mut self, packet: &TelemetryPacket) {
        self.stats.packets_received += 1;

        let header = &packet.header;
        let count = header.sequence.count();

        if !packet.has_expected_length() {
            tracing::warn!(
                "Packet seq={} declares data length {}, payload is fixed",
                count,
                header.data_length
            );
        }

        if let Some(last) = self.last_sequence {
            if count != protocol::successor(last) {
                if count == 0 {
                    self.stats.restarts += 1;
                    tracing::info!("Sequence count restarted after {}, producer likely restarted", last);
                } else {
                    let missing = protocol::gap(last, count);
                    self.stats.sequence_gaps += 1;
                    self.stats.packets_lost += u64::from(missing);
                    tracing::warn!(
                        "Sequence gap: {} -> {} ({} packets missing)",
                        last,
                        count,
                        missing
                    );
                }
            }
        }
        self.last_sequence = Some(count);

        tracing::info!(
            "Version={} Packet Type={:?} PID={} Secondary Header={} Sequence={} Temperature={:.2} C Humidity={:.2} %",
            header.packet_id.version(),
            header.packet_id.packet_type(),
            header.packet_id.process_id(),
            header.packet_id.secondary_header(),
            count,
            packet.measurement.temperature_celsius(),
            packet.measurement.humidity_percent()
        );

        self.sink.render(&packet.measurement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::RecordingDisplay;
    use crate::protocol::{
        encode_frame, Measurement, PacketId, PacketType, SequenceControl, SequenceFlags,
        FRAME_SIZE,
    };

    fn frame(count: u16, temperature: i16) -> [u8; FRAME_SIZE] {
        encode_frame(&TelemetryPacket::new(
            PacketId::new(0, PacketType::Telemetry, true, 1).unwrap(),
            SequenceControl::new(SequenceFlags::Unsegmented, count).unwrap(),
            Measurement::new(temperature, 5000),
        ))
    }

    fn stream(counts: &[u16]) -> Vec<u8> {
        counts.iter().flat_map(|&c| frame(c, c as i16)).collect()
    }

    #[test]
    fn test_poll_renders_each_packet() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.push(&stream(&[0, 1, 2]));

        let packets = consumer.poll();

        assert_eq!(packets.len(), 3);
        assert_eq!(consumer.sink().rendered.len(), 3);
        assert_eq!(consumer.sink().rendered[2].temperature_centidegrees, 2);
        assert_eq!(consumer.pending(), 0);
    }

    #[test]
    fn test_poll_without_enough_bytes_makes_no_packet() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        let bytes = frame(0, 100);

        consumer.push(&bytes[..7]);
        assert!(consumer.poll().is_empty());
        assert!(matches!(
            consumer.decoder_state(),
            DecodeState::AwaitingBody { .. }
        ));

        consumer.push(&bytes[7..]);
        assert_eq!(consumer.poll().len(), 1);
    }

    #[test]
    fn test_bad_length_counted_and_recovered() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.push(&[0x02, 0x00]);
        consumer.push(&frame(0, 1));

        let packets = consumer.poll();

        assert_eq!(packets.len(), 1);
        assert_eq!(consumer.stats().framing_errors, 1);
    }

    #[test]
    fn test_sequence_gap_detected() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.push(&stream(&[5, 6, 9, 10]));
        consumer.poll();

        assert_eq!(consumer.stats().sequence_gaps, 1);
        assert_eq!(consumer.stats().packets_lost, 2);
        assert_eq!(consumer.stats().restarts, 0);
    }

    #[test]
    fn test_wraparound_is_not_a_gap() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.push(&stream(&[16382, 16383, 0, 1]));
        consumer.poll();

        assert_eq!(consumer.stats().sequence_gaps, 0);
        assert_eq!(consumer.stats().restarts, 0);
    }

    #[test]
    fn test_restart_is_not_a_gap() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.push(&stream(&[40, 41, 0, 1]));
        consumer.poll();

        assert_eq!(consumer.stats().sequence_gaps, 0);
        assert_eq!(consumer.stats().restarts, 1);
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.push(&stream(&[3]));
        consumer.push(&frame(4, 0)[..5]);
        consumer.poll();

        consumer.reset();
        consumer.push(&stream(&[10]));
        consumer.poll();

        assert_eq!(consumer.pending(), 0);
        assert_eq!(consumer.stats().packets_received, 2);
        assert_eq!(consumer.stats().sequence_gaps, 0);
    }

    #[tokio::test]
    async fn test_run_over_fragmented_reads() {
        let bytes = stream(&[0, 1]);
        let mut reader = tokio_test::io::Builder::new()
            .read(&bytes[..1])
            .read(&bytes[1..3])
            .read(&bytes[3..13])
            .read(&bytes[13..20])
            .read(&bytes[20..])
            .build();

        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.run(&mut reader, None).await.unwrap();

        assert_eq!(consumer.stats().packets_received, 2);
        assert_eq!(consumer.stats().bytes_received, bytes.len() as u64);
        assert_eq!(consumer.sink().rendered.len(), 2);
    }

    #[tokio::test]
    async fn test_run_reports_truncated_frame() {
        let bytes = frame(0, 0);
        let mut reader = tokio_test::io::Builder::new().read(&bytes[..8]).build();

        let mut consumer = Consumer::new(RecordingDisplay::default());
        let err = consumer.run(&mut reader, None).await.unwrap_err();

        assert!(matches!(err, LinkError::Closed { pending: 6 }));
    }

    #[test]
    fn test_poll_until_leaves_excess_frames_buffered() {
        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.push(&stream(&[0, 1, 2]));

        let packets = consumer.poll_until(Some(2));

        assert_eq!(packets.len(), 2);
        assert_eq!(consumer.sink().rendered.len(), 2);
        assert_eq!(consumer.pending(), FRAME_SIZE);
    }

    #[tokio::test]
    async fn test_run_limit_within_single_read() {
        let bytes = stream(&[0, 1, 2]);
        let mut reader = tokio_test::io::Builder::new().read(&bytes).build();

        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.run(&mut reader, Some(2)).await.unwrap();

        assert_eq!(consumer.stats().packets_received, 2);
        assert_eq!(consumer.sink().rendered.len(), 2);
        assert_eq!(consumer.pending(), FRAME_SIZE);
    }

    #[tokio::test]
    async fn test_run_stops_at_limit() {
        let bytes = stream(&[0, 1, 2]);
        let mut reader = tokio_test::io::Builder::new()
            .read(&bytes[..FRAME_SIZE])
            .read(&bytes[FRAME_SIZE..2 * FRAME_SIZE])
            .build();

        let mut consumer = Consumer::new(RecordingDisplay::default());
        consumer.run(&mut reader, Some(2)).await.unwrap();

        assert_eq!(consumer.stats().packets_received, 2);
    }
}
