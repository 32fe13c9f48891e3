//! Configuration for the flow sensor agent.
//!
//! Two kinds of configuration live here: the per-transducer calibration
//! profiles (fixed at startup, validated once) and the agent-level settings
//! (sample period, active sinks, telemetry destination) persisted as JSON
//! in the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Pressure unit a transducer's value range is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureUnit {
    Psi,
    CmH2o,
    KiloPascal,
    Pascal,
}

impl PressureUnit {
    /// Pascals per one unit of pressure.
    pub fn pascals_per_unit(&self) -> f64 {
        match self {
            PressureUnit::Psi => 6894.7572932,
            PressureUnit::CmH2o => 98.0665,
            PressureUnit::KiloPascal => 1000.0,
            PressureUnit::Pascal => 1.0,
        }
    }

    /// Centimetres of water per one unit of pressure.
    pub fn cmh2o_per_unit(&self) -> f64 {
        match self {
            PressureUnit::Psi => 70.30696,
            PressureUnit::CmH2o => 1.0,
            PressureUnit::KiloPascal => 10.197162129779283,
            PressureUnit::Pascal => 0.010197162129779283,
        }
    }
}

/// Calibration parameters for one transducer channel.
///
/// Immutable after channel construction. `flow_coefficient` is set only on
/// the differential channel; its sign is deliberately unconstrained so a
/// reversed plumbing run can be expressed as a negative k.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProfile {
    /// Short name used in diagnostics ("pressure", "flow").
    pub label: String,
    /// Bus address of the device.
    pub address: u8,
    /// Raw count emitted at `min_value`.
    pub min_output: u16,
    /// Raw count emitted at `max_value`.
    pub max_output: u16,
    /// Physical value at `min_output`.
    pub min_value: f64,
    /// Physical value at `max_output`.
    pub max_value: f64,
    /// Unit `min_value..max_value` is expressed in.
    pub unit: PressureUnit,
    /// Orifice coefficient for flow derivation, if this channel feeds one.
    pub flow_coefficient: Option<f64>,
    /// Factory-measured zero offset the tracker starts from.
    pub zero_offset: f64,
}

impl ChannelProfile {
    /// Reject degenerate calibration ranges before any channel is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_output == self.min_output {
            return Err(ConfigError::DegenerateRange(format!(
                "{}: output range {}..{} has zero width",
                self.label, self.min_output, self.max_output
            )));
        }
        if self.max_value == self.min_value {
            return Err(ConfigError::DegenerateRange(format!(
                "{}: value range {}..{} has zero width",
                self.label, self.min_value, self.max_value
            )));
        }
        Ok(())
    }

    /// Linearly rescale raw counts onto the physical value range.
    pub fn counts_to_value(&self, counts: u16) -> f64 {
        (counts as f64 - self.min_output as f64) * (self.max_value - self.min_value)
            / (self.max_output as f64 - self.min_output as f64)
            + self.min_value
    }

    /// Smallest physical step one raw count can represent. Used as the
    /// noise floor that gates steady-state zero tracking.
    pub fn noise_floor(&self) -> f64 {
        (self.max_value - self.min_value) / (self.max_output as f64 - self.min_output as f64)
    }
}

// ABPDANT030PG0D3, last 8 characters decoded per the ABP series datasheet:
//   030PG -> 0-30 PSI gauge
//   0     -> bus address 0x08
//   D     -> 10% to 90% of 2^14 counts, temperature output enabled
//   3     -> 3.3V version
/// Profile for the absolute (airway pressure) transducer.
pub fn absolute_pressure_profile() -> ChannelProfile {
    ChannelProfile {
        label: "pressure".to_string(),
        address: 0x08,
        min_output: 1638,
        max_output: 14745,
        min_value: 0.0,
        max_value: 30.0,
        unit: PressureUnit::Psi,
        flow_coefficient: None,
        zero_offset: -0.046849,
    }
}

// HSCMRRV001PD2A3, last 8 characters decoded per the HSC series datasheet:
//   001PD -> ±1 PSI differential
//   2     -> bus address 0x28
//   A     -> 10% to 90% of 2^14 counts
//   3     -> 3.3V version
/// Profile for the differential transducer the flow derivation runs on.
pub fn differential_flow_profile() -> ChannelProfile {
    ChannelProfile {
        label: "flow".to_string(),
        address: 0x28,
        min_output: 1638,
        max_output: 14745,
        min_value: -1.0,
        max_value: 1.0,
        unit: PressureUnit::Psi,
        flow_coefficient: Some(0.05291351624874463),
        zero_offset: -0.000951,
    }
}

/// Which output sinks are active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkSelection {
    pub text: bool,
    pub telemetry: bool,
    pub indicator: bool,
}

impl Default for SinkSelection {
    fn default() -> Self {
        Self {
            text: true,
            telemetry: false,
            indicator: false,
        }
    }
}

impl SinkSelection {
    /// Parse a sink selection from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sinks: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            text: sinks.iter().any(|s| s == "text" || s == "all"),
            telemetry: sinks.iter().any(|s| s == "telemetry" || s == "all"),
            indicator: sinks.iter().any(|s| s == "indicator" || s == "all"),
        }
    }

    /// Check if at least one sink is enabled.
    pub fn any_enabled(&self) -> bool {
        self.text || self.telemetry || self.indicator
    }
}

/// Agent-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Target sampling period
    #[serde(with = "duration_us_serde")]
    pub sample_period: Duration,

    /// Which sinks consume readings
    pub sinks: SinkSelection,

    /// Text sink fires every N ticks
    pub text_every: u32,

    /// Telemetry sink fires every N ticks
    pub telemetry_every: u32,

    /// Temperature is reported once per N telemetry firings
    pub telemetry_temperature_every: u32,

    /// Indicator sink fires every N ticks
    pub indicator_every: u32,

    /// Telemetry destination host
    pub telemetry_host: String,

    /// Telemetry destination UDP port
    pub telemetry_port: u16,

    /// Serial port the transducer bus hangs off
    pub serial_port: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_micros(2000),
            sinks: SinkSelection::default(),
            text_every: 20,
            telemetry_every: 20,
            telemetry_temperature_every: 200,
            indicator_every: 20,
            telemetry_host: "127.0.0.1".to_string(),
            telemetry_port: 6111,
            serial_port: "/dev/ttyUSB0".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: AgentConfig = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flow-sensor-agent")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    DegenerateRange(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::DegenerateRange(e) => write!(f, "Degenerate calibration range: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole microseconds.
mod duration_us_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_micros() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Duration::from_micros(micros))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_selection_parsing() {
        let sinks = SinkSelection::from_csv("text,telemetry");
        assert!(sinks.text);
        assert!(sinks.telemetry);
        assert!(!sinks.indicator);

        let sinks = SinkSelection::from_csv("all");
        assert!(sinks.text);
        assert!(sinks.telemetry);
        assert!(sinks.indicator);

        let sinks = SinkSelection::from_csv("none");
        assert!(!sinks.any_enabled());
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.sample_period, Duration::from_micros(2000));
        assert_eq!(config.text_every, 20);
        assert_eq!(config.telemetry_port, 6111);
        assert!(config.sinks.text);
    }

    #[test]
    fn test_rescale_endpoints() {
        let profile = absolute_pressure_profile();
        assert!((profile.counts_to_value(1638) - 0.0).abs() < 1e-9);
        assert!((profile.counts_to_value(14745) - 30.0).abs() < 1e-9);

        let profile = differential_flow_profile();
        assert!((profile.counts_to_value(1638) - -1.0).abs() < 1e-9);
        assert!((profile.counts_to_value(14745) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rescale_midpoint() {
        // Half of the 14-bit span lands very close to half of 0-30 psi.
        let profile = absolute_pressure_profile();
        assert!((profile.counts_to_value(8192) - 15.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_rejects_zero_width_ranges() {
        let mut profile = absolute_pressure_profile();
        profile.min_output = profile.max_output;
        assert!(profile.validate().is_err());

        let mut profile = absolute_pressure_profile();
        profile.min_value = profile.max_value;
        assert!(profile.validate().is_err());

        assert!(absolute_pressure_profile().validate().is_ok());
        assert!(differential_flow_profile().validate().is_ok());
    }

    #[test]
    fn test_noise_floor_matches_count_resolution() {
        let profile = differential_flow_profile();
        let floor = profile.noise_floor();
        assert!((floor - 2.0 / 13107.0).abs() < 1e-12);
    }
}
