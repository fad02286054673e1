//! Configuration module
//!
//! Handles loading and saving link configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::link::ProducerConfig;
use crate::protocol::{HeaderError, PacketId, PacketType, SequenceFlags, CCSDS_VERSION, DEFAULT_ADDRESS};
use crate::sensor::SimulatedSensorConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid producer settings: {0}")]
    Invalid(#[from] HeaderError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Link settings
    #[serde(default)]
    pub link: LinkConfig,

    /// Transmitter settings
    #[serde(default)]
    pub producer: ProducerSettings,

    /// Simulated sensor settings
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// Link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Address the receiver listens on and the transmitter connects to
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

/// Packet type as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketTypeSetting {
    Telemetry,
    Telecommand,
}

impl From<PacketTypeSetting> for PacketType {
    fn from(setting: PacketTypeSetting) -> Self {
        match setting {
            PacketTypeSetting::Telemetry => PacketType::Telemetry,
            PacketTypeSetting::Telecommand => PacketType::Telecommand,
        }
    }
}

/// Sequence flags as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceFlagsSetting {
    Continuation,
    First,
    Last,
    Unsegmented,
}

impl From<SequenceFlagsSetting> for SequenceFlags {
    fn from(setting: SequenceFlagsSetting) -> Self {
        match setting {
            SequenceFlagsSetting::Continuation => SequenceFlags::Continuation,
            SequenceFlagsSetting::First => SequenceFlags::First,
            SequenceFlagsSetting::Last => SequenceFlags::Last,
            SequenceFlagsSetting::Unsegmented => SequenceFlags::Unsegmented,
        }
    }
}

/// Transmitter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerSettings {
    /// Time between packets (ms)
    #[serde(default = "default_period")]
    pub period_ms: u64,
    /// Packet version number (3 bits)
    #[serde(default)]
    pub version: u8,
    /// Packet type
    #[serde(default = "default_packet_type")]
    pub packet_type: PacketTypeSetting,
    /// Secondary header present
    #[serde(default = "default_true")]
    pub secondary_header: bool,
    /// Process id / APID (11 bits)
    #[serde(default = "default_process_id")]
    pub process_id: u16,
    /// Sequence flags
    #[serde(default = "default_sequence_flags")]
    pub sequence_flags: SequenceFlagsSetting,
}

fn default_period() -> u64 {
    2000
}

fn default_packet_type() -> PacketTypeSetting {
    PacketTypeSetting::Telemetry
}

fn default_true() -> bool {
    true
}

fn default_process_id() -> u16 {
    0x01
}

fn default_sequence_flags() -> SequenceFlagsSetting {
    SequenceFlagsSetting::Unsegmented
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            period_ms: default_period(),
            version: CCSDS_VERSION,
            packet_type: default_packet_type(),
            secondary_header: default_true(),
            process_id: default_process_id(),
            sequence_flags: default_sequence_flags(),
        }
    }
}

impl ProducerSettings {
    /// Build the packet identity, checking field widths
    pub fn packet_id(&self) -> ConfigResult<PacketId> {
        Ok(PacketId::new(
            self.version,
            self.packet_type.into(),
            self.secondary_header,
            self.process_id,
        )?)
    }

    pub fn to_producer_config(&self) -> ConfigResult<ProducerConfig> {
        Ok(ProducerConfig {
            packet_id: self.packet_id()?,
            sequence_flags: self.sequence_flags.into(),
            period: Duration::from_millis(self.period_ms),
        })
    }
}

/// Simulated sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Temperature the simulation drifts around (C)
    #[serde(default = "default_base_temperature")]
    pub base_temperature: f32,
    /// Humidity the simulation drifts around (%)
    #[serde(default = "default_base_humidity")]
    pub base_humidity: f32,
    /// Drift amplitude
    #[serde(default = "default_drift")]
    pub drift: f32,
    /// Fail every Nth read (0 = never)
    #[serde(default)]
    pub fail_every: u32,
}

fn default_base_temperature() -> f32 {
    23.45
}

fn default_base_humidity() -> f32 {
    60.12
}

fn default_drift() -> f32 {
    0.5
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            base_temperature: default_base_temperature(),
            base_humidity: default_base_humidity(),
            drift: default_drift(),
            fail_every: 0,
        }
    }
}

impl From<&SensorConfig> for SimulatedSensorConfig {
    fn from(config: &SensorConfig) -> Self {
        Self {
            base_temperature: config.base_temperature,
            base_humidity: config.base_humidity,
            drift: config.drift,
            fail_every: config.fail_every,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("ccsds-link/config.toml")),
            Some(PathBuf::from("./ccsds-link.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        Self::load_first(config_paths.iter().flatten())
    }

    /// Load the first existing file among `paths`, or the defaults if none exist
    pub fn load_first<'a, I>(paths: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        for path in paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check settings that cannot be expressed in the types
    pub fn validate(&self) -> ConfigResult<()> {
        self.producer.packet_id()?;
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        link: LinkConfig {
            address: "0.0.0.0:7010".to_string(),
        },
        producer: ProducerSettings {
            period_ms: 1000,
            process_id: 0x2A,
            ..Default::default()
        },
        sensor: SensorConfig {
            fail_every: 10,
            ..Default::default()
        },
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.link.address, DEFAULT_ADDRESS);
        assert_eq!(config.producer.period_ms, 2000);

        let id = config.producer.packet_id().unwrap();
        assert_eq!(crate::protocol::encode_packet_id(&id), 0x0801);
    }

    #[test]
    fn test_save_and_load() {
        let config = Config::default();
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.link.address, config.link.address);
        assert_eq!(loaded.producer.process_id, config.producer.process_id);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[producer]\nprocess_id = 300\nsequence_flags = \"first\"").unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.producer.process_id, 300);
        assert_eq!(loaded.producer.sequence_flags, SequenceFlagsSetting::First);
        assert_eq!(loaded.producer.period_ms, 2000);
        assert_eq!(loaded.link.address, DEFAULT_ADDRESS);
    }

    #[test]
    fn test_out_of_range_process_id_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[producer]\nprocess_id = 4096").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_search_path_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let invalid = dir.path().join("ccsds-link.toml");
        std::fs::write(&invalid, "[producer]\nprocess_id = 4096\n").unwrap();

        let paths = [dir.path().join("missing.toml"), invalid];
        let err = Config::load_first(&paths).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_search_path_picks_first_existing() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        std::fs::write(&first, "[producer]\nprocess_id = 7\n").unwrap();
        std::fs::write(&second, "[producer]\nprocess_id = 4096\n").unwrap();

        let loaded = Config::load_first(&[first, second]).unwrap();
        assert_eq!(loaded.producer.process_id, 7);
    }

    #[test]
    fn test_search_path_without_files_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_first(&[dir.path().join("none.toml")]).unwrap();
        assert_eq!(loaded.producer.process_id, Config::default().producer.process_id);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/ccsds-link.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.producer.process_id, 0x2A);
        assert_eq!(parsed.sensor.fail_every, 10);
    }
}
