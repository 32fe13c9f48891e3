//! Flow Sensor Agent - continuous pressure and flow monitoring.
//!
//! This library samples two pressure transducers at a fixed cadence,
//! calibrates the raw readings, derives volumetric flow from differential
//! pressure, and fans the results out to pluggable output sinks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Flow Sensor Agent                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │FrameSource│──▶│SensorChannel │──▶│FlowDerivation│         │
//! │  │ (bus read)│   │(avg + zero)  │   │(orifice law) │         │
//! │  └───────────┘   └──────────────┘   └──────┬───────┘         │
//! │        ▲                                   │                 │
//! │        │                                   ▼                 │
//! │  ┌───────────┐                  ┌─────────────────────┐      │
//! │  │ Scheduler │                  │ Sinks: text / UDP   │      │
//! │  │ (2ms tick)│                  │ telemetry/indicator │      │
//! │  └───────────┘                  └─────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use flow_sensor_agent::bus::{FrameSource, SyntheticSource};
//! use flow_sensor_agent::config::differential_flow_profile;
//! use flow_sensor_agent::core::{FlowDerivation, SensorChannel};
//!
//! let profile = differential_flow_profile();
//! let k = profile.flow_coefficient.expect("differential profile has k");
//! let unit = profile.unit;
//!
//! let mut source = SyntheticSource::new(8192, 400, 500, 1023);
//! let mut channel = SensorChannel::new(profile).expect("valid profile");
//! let mut flow = FlowDerivation::new(k, unit);
//!
//! let frame = source.read_frame().expect("synthetic frames never fail");
//! channel.decode(frame);
//! let smoothed = flow.update(channel.pressure());
//! println!("flow: {smoothed:.3}");
//! ```

pub mod bus;
pub mod config;
pub mod core;
pub mod scheduler;
pub mod sink;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use bus::{BusError, FrameSource, RawFrame};
pub use config::{AgentConfig, ChannelProfile, ConfigError, PressureUnit, SinkSelection};
pub use core::{ChannelReading, FlowDerivation, RollingWindow, SensorChannel};
pub use scheduler::SampleScheduler;
pub use sink::OutputSink;
pub use telemetry::Measurement;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
