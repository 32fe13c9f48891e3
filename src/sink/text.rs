//! Tab-separated text output.
//!
//! One header line at construction, then one data line per decimation
//! interval. Field order is fixed; downstream analysis scripts key on it.

use crate::core::ChannelReading;
use crate::sink::OutputSink;
use std::io::Write;
use std::time::Duration;

/// Column header emitted once at construction.
pub const HEADER: &str = "ms\tflow\tflow_pressure\ttemperature\tflow_zero\tflow_raw\tflow_raw_avg\tpressure\tpressure_zero\tpressure_raw\tpressure_cmh2o";

/// Text sink writing to any `Write` target (stdout in production).
pub struct TextSink<W: Write> {
    every: u32,
    count: u32,
    out: W,
}

impl TextSink<std::io::Stdout> {
    /// Text sink on standard output.
    pub fn stdout(every: u32) -> Self {
        Self::new(every, std::io::stdout())
    }
}

impl<W: Write> TextSink<W> {
    pub fn new(every: u32, mut out: W) -> Self {
        let _ = writeln!(out, "{HEADER}");
        Self {
            every,
            count: 0,
            out,
        }
    }

    /// Consume the sink and return its writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Space-pad non-negative values so columns stay aligned across sign
/// changes.
fn signed(value: f64, precision: usize) -> String {
    if value >= 0.0 {
        format!(" {value:.precision$}")
    } else {
        format!("{value:.precision$}")
    }
}

impl<W: Write> OutputSink for TextSink<W> {
    fn output(&mut self, pressure: &ChannelReading, flow: &ChannelReading, elapsed: Duration) {
        self.count += 1;
        if self.count != self.every {
            return;
        }
        self.count = 0;

        let _ = writeln!(
            self.out,
            "{:.9}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            elapsed.as_secs_f64(),
            signed(flow.flow.unwrap_or(0.0), 6),
            signed(flow.pressure, 9),
            signed(flow.temperature, 6),
            signed(flow.zero_offset, 6),
            signed(flow.raw_pressure, 6),
            signed(flow.raw_pressure_avg, 6),
            signed(pressure.pressure, 9),
            signed(pressure.zero_offset, 6),
            signed(pressure.raw_pressure, 6),
            signed(pressure.pressure_cmh2o, 9),
        );
    }
}
