//! Core value pipeline for the flow sensor agent.
//!
//! This module contains:
//! - Rolling-average windows over raw samples
//! - Transducer channels (decode, calibration, zero tracking)
//! - Flow derivation from differential pressure

pub mod channel;
pub mod flow;
pub mod window;

// Re-export commonly used types
pub use channel::{ChannelReading, SensorChannel, SAMPLE_WINDOW};
pub use flow::FlowDerivation;
pub use window::RollingWindow;
