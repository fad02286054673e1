//! Transmitting end of the link
//!
//! One cycle per period: sample, build a packet, frame it, write it.
//! A failed sample skips the cycle without consuming a sequence count.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;

use super::LinkResult;
use crate::protocol::{self, PacketId, SequenceCounter, SequenceFlags, TelemetryPacket, FRAME_SIZE};
use crate::sensor::{MeasurementSource, SensorResult};

/// Settings for the transmitting end
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Identity stamped into every packet
    pub packet_id: PacketId,
    /// Sequence flags stamped into every packet
    pub sequence_flags: SequenceFlags,
    /// Time between cycles
    pub period: Duration,
}

/// Producer statistics
#[derive(Debug, Default, Clone)]
pub struct ProducerStats {
    /// Packets written to the link
    pub packets_sent: u64,
    /// Cycles skipped because the sample failed
    pub cycles_skipped: u64,
    /// Bytes written to the link
    pub bytes_sent: u64,
}

/// Samples a source and emits framed packets
pub struct Producer<S: MeasurementSource> {
    config: ProducerConfig,
    source: S,
    counter: SequenceCounter,
    write_buf: BytesMut,
    stats: ProducerStats,
}

impl<S: MeasurementSource> Producer<S> {
    pub fn new(config: ProducerConfig, source: S) -> Self {
        Self {
            config,
            source,
            counter: SequenceCounter::new(),
            write_buf: BytesMut::with_capacity(FRAME_SIZE),
            stats: ProducerStats::default(),
        }
    }

    pub fn stats(&self) -> &ProducerStats {
        &self.stats
    }

    /// Sample the source and build the next packet.
    /// The sequence count only advances when a packet is built.
    pub async fn build_packet(&mut self) -> SensorResult<TelemetryPacket> {
        let reading = self.source.read().await?;
        let measurement = reading.to_measurement()?;
        let sequence = self.counter.next_control(self.config.sequence_flags);

        Ok(TelemetryPacket::new(self.config.packet_id, sequence, measurement))
    }

    /// Run one cycle. Returns the packet that was sent, or None if the
    /// sample failed and the cycle was skipped.
    pub async fn cycle<W>(&mut self, writer: &mut W) -> LinkResult<Option<TelemetryPacket>>
    where
        W: AsyncWrite + Unpin,
    {
        let packet = match self.build_packet().await {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.cycles_skipped += 1;
                tracing::warn!("Skipping cycle: {}", e);
                return Ok(None);
            }
        };

        self.write_buf.clear();
        protocol::encode(&packet, &mut self.write_buf);

        writer.write_all(&self.write_buf).await?;
        writer.flush().await?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;

        tracing::debug!(
            "Sent packet seq={} temperature={} humidity={}",
            packet.header.sequence.count(),
            packet.measurement.temperature_centidegrees,
            packet.measurement.humidity_centipercent
        );

        Ok(Some(packet))
    }

    /// Run a cycle every period until `limit` packets were sent (or forever)
    pub async fn run<W>(&mut self, writer: &mut W, limit: Option<u64>) -> LinkResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut ticker = tokio::time::interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while limit.map_or(true, |n| self.stats.packets_sent < n) {
            ticker.tick().await;
            self.cycle(writer).await?;
        }

        writer.shutdown().await?;
        tracing::info!(
            "Producer finished: {} sent, {} skipped",
            self.stats.packets_sent,
            self.stats.cycles_skipped
        );
        Ok(())
    }
}
