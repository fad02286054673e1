//! Measurement sources
//!
//! The producer samples one reading per cycle through the `MeasurementSource`
//! trait. A simulated source stands in for real hardware.

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{Measurement, PacketError};

/// Errors that can occur while sampling a measurement
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("Sensor read failed: {0}")]
    ReadFailed(String),

    #[error("Invalid reading: {0}")]
    InvalidReading(#[from] PacketError),
}

pub type SensorResult<T> = Result<T, SensorError>;

/// A raw reading, before scaling into the payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity percent
    pub humidity: f32,
}

impl Reading {
    pub fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
        }
    }

    /// Convert into a payload, rejecting NaN and unrepresentable values
    pub fn to_measurement(&self) -> SensorResult<Measurement> {
        Ok(Measurement::from_reading(self.temperature, self.humidity)?)
    }
}

/// Trait for anything the producer can sample once per cycle
#[async_trait]
pub trait MeasurementSource: Send {
    /// Take one reading
    async fn read(&mut self) -> SensorResult<Reading>;
}

/// Settings for the simulated sensor
#[derive(Debug, Clone)]
pub struct SimulatedSensorConfig {
    pub base_temperature: f32,
    pub base_humidity: f32,
    /// Peak deviation from the base values
    pub drift: f32,
    /// Fail every Nth read (0 = never)
    pub fail_every: u32,
}

impl Default for SimulatedSensorConfig {
    fn default() -> Self {
        Self {
            base_temperature: 23.45,
            base_humidity: 60.12,
            drift: 0.5,
            fail_every: 0,
        }
    }
}

/// Deterministic source drifting slowly around configured base values
pub struct SimulatedSensor {
    config: SimulatedSensorConfig,
    reads: u32,
}

impl SimulatedSensor {
    pub fn new(config: SimulatedSensorConfig) -> Self {
        Self { config, reads: 0 }
    }

    /// Number of reads attempted so far
    pub fn reads(&self) -> u32 {
        self.reads
    }
}

#[async_trait]
impl MeasurementSource for SimulatedSensor {
    async fn read(&mut self) -> SensorResult<Reading> {
        self.reads = self.reads.wrapping_add(1);

        if self.config.fail_every != 0 && self.reads % self.config.fail_every == 0 {
            // what a DHT11 timeout looks like to the caller
            return Ok(Reading::new(f32::NAN, f32::NAN));
        }

        let phase = self.reads.wrapping_sub(1) as f32 * 0.1;
        Ok(Reading::new(
            self.config.base_temperature + self.config.drift * phase.sin(),
            self.config.base_humidity + self.config.drift * 2.0 * phase.cos() - self.config.drift * 2.0,
        ))
    }
}
