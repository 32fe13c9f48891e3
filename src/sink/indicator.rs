//! Visual indicator sink.
//!
//! Maps the current flow and pressure onto a one-dimensional bar of
//! display elements centred at a zero index. Each element carries two
//! intensity channels (flow, pressure) in 0..=1; brightness scaling and
//! the physical device live behind [`IndicatorDevice`].

use crate::core::ChannelReading;
use crate::sink::OutputSink;
use std::time::Duration;
use tracing::debug;

/// Default flow span mapped across the bar (units per minute).
const DEFAULT_FLOW_SPAN: (f64, f64) = (-80.0, 80.0);

/// Default pressure span mapped across the bar (cmH2O).
const DEFAULT_PRESSURE_SPAN: (f64, f64) = (-5.0, 20.0);

/// Per-element intensity pair, each channel in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementIntensity {
    pub flow: f64,
    pub pressure: f64,
}

/// A physical (or logging) indicator device.
pub trait IndicatorDevice {
    /// Number of elements on the device.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Present one intensity pair per element.
    fn show(&mut self, levels: &[ElementIntensity]);
}

/// Indicator sink with per-sink decimation.
pub struct IndicatorSink<D: IndicatorDevice> {
    device: D,
    every: u32,
    count: u32,
    flow_span: (f64, f64),
    pressure_span: (f64, f64),
    zero_index: f64,
}

impl<D: IndicatorDevice> IndicatorSink<D> {
    pub fn new(device: D, every: u32) -> Self {
        let (min_flow, max_flow) = DEFAULT_FLOW_SPAN;
        let zero_index = (device.len() as f64 - 1.0) / ((max_flow - min_flow) / max_flow);
        Self {
            device,
            every,
            count: 0,
            flow_span: DEFAULT_FLOW_SPAN,
            pressure_span: DEFAULT_PRESSURE_SPAN,
            zero_index,
        }
    }

    /// Compute the element intensities for one firing.
    fn levels(&self, flow: f64, pressure_cmh2o: f64) -> Vec<ElementIntensity> {
        let count = self.device.len() as f64;
        let flow_value = flow / (self.flow_span.1 - self.flow_span.0) * count;
        let pressure_value = pressure_cmh2o / (self.pressure_span.1 - self.pressure_span.0) * count;

        (0..self.device.len())
            .map(|n| {
                let offset = n as f64 - self.zero_index;
                ElementIntensity {
                    flow: element_intensity(offset, flow_value),
                    pressure: element_intensity(offset, pressure_value),
                }
            })
            .collect()
    }
}

/// Triangular falloff around the mapped value. An element lights only when
/// it lies between the zero index and the mapped value.
fn element_intensity(offset: f64, mapped: f64) -> f64 {
    if mapped == 0.0 || offset / mapped <= 0.0 {
        return 0.0;
    }
    (0.5 + mapped.abs() - offset.abs()).clamp(0.0, 1.0)
}

impl<D: IndicatorDevice> OutputSink for IndicatorSink<D> {
    fn output(&mut self, pressure: &ChannelReading, flow: &ChannelReading, _elapsed: Duration) {
        self.count += 1;
        if self.count != self.every {
            return;
        }
        self.count = 0;

        let levels = self.levels(flow.flow.unwrap_or(0.0), pressure.pressure_cmh2o);
        self.device.show(&levels);
    }
}

/// Indicator device that renders the bar as a trace line. Stands in when
/// no physical indicator is attached.
pub struct LogIndicator {
    elements: usize,
}

impl LogIndicator {
    pub fn new(elements: usize) -> Self {
        Self { elements }
    }
}

impl IndicatorDevice for LogIndicator {
    fn len(&self) -> usize {
        self.elements
    }

    fn show(&mut self, levels: &[ElementIntensity]) {
        let bar: String = levels
            .iter()
            .map(|l| {
                let intensity = l.flow.max(l.pressure);
                match (intensity * 4.0).round() as u8 {
                    0 => '.',
                    1 => '-',
                    2 => '+',
                    3 => '*',
                    _ => '#',
                }
            })
            .collect();
        debug!(target: "indicator", "[{bar}]");
    }
}
