//! Output sinks consuming per-tick readings.
//!
//! Sinks run synchronously, in fixed order, only after both channels have
//! updated for the tick. Each sink decimates independently: it fires once
//! every N underlying ticks and stays silent otherwise.

pub mod indicator;
pub mod telemetry;
pub mod text;

// Re-export commonly used types
pub use indicator::{ElementIntensity, IndicatorDevice, IndicatorSink, LogIndicator};
pub use telemetry::TelemetrySink;
pub use text::TextSink;

use crate::core::ChannelReading;
use std::time::Duration;

/// Consumer of per-tick readings.
pub trait OutputSink {
    /// Consume one tick. `elapsed` is the time since session start at the
    /// tick's read timestamp.
    fn output(&mut self, pressure: &ChannelReading, flow: &ChannelReading, elapsed: Duration);
}

/// Fan one tick's readings out to every active sink, in order.
pub fn fan_out(
    sinks: &mut [Box<dyn OutputSink>],
    pressure: &ChannelReading,
    flow: &ChannelReading,
    elapsed: Duration,
) {
    for sink in sinks.iter_mut() {
        sink.output(pressure, flow, elapsed);
    }
}
