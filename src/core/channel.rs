//! One transducer channel: frame decode, rolling average, zero tracking.
//!
//! A channel turns a raw 4-byte bus frame into a calibrated pressure and a
//! temperature. Decode never fails once four bytes exist; bus-level
//! failures are recorded by the caller and leave the channel's last values
//! in place.

use crate::config::{ChannelProfile, ConfigError};
use crate::core::window::RollingWindow;
use serde::Serialize;

/// Samples averaged by each channel's rolling window.
pub const SAMPLE_WINDOW: usize = 40;

/// Startup samples during which the zero offset converges at the fast rate.
const ZERO_WARMUP_SAMPLES: u32 = 300;

/// Adaptive zero-offset tracker.
///
/// Two-regime exponential smoothing: a fast warm-up while the line is
/// assumed idle at startup, then a slow nudge that only engages when the
/// raw average sits within one count-resolution step of the current
/// offset. A genuine non-zero signal never perturbs the offset, while
/// thermal and aging drift is still chased at idle.
#[derive(Debug, Clone)]
struct ZeroTracker {
    offset: f64,
    warmup_left: u32,
    fast_rate: f64,
    slow_rate: f64,
    noise_floor: f64,
}

impl ZeroTracker {
    fn new(initial_offset: f64, noise_floor: f64) -> Self {
        let fast_rate = 2.0 / ZERO_WARMUP_SAMPLES as f64;
        Self {
            offset: initial_offset,
            warmup_left: ZERO_WARMUP_SAMPLES,
            fast_rate,
            slow_rate: fast_rate / 20.0,
            noise_floor,
        }
    }

    /// Fold the latest raw average into the offset and return it.
    fn update(&mut self, raw_avg: f64) -> f64 {
        if self.warmup_left > 0 {
            self.offset = self.offset * (1.0 - self.fast_rate) + raw_avg * self.fast_rate;
            self.warmup_left -= 1;
        } else if (raw_avg - self.offset).abs() < self.noise_floor {
            self.offset = self.offset * (1.0 - self.slow_rate) + raw_avg * self.slow_rate;
        }
        self.offset
    }
}

/// Calibrated state of one transducer channel.
pub struct SensorChannel {
    profile: ChannelProfile,
    window: RollingWindow,
    zero: ZeroTracker,
    status: u8,
    raw_pressure: f64,
    raw_pressure_avg: f64,
    pressure: f64,
    temperature: f64,
    consecutive_failures: u32,
}

impl SensorChannel {
    /// Build a channel from a calibration profile.
    ///
    /// The profile is validated here so a degenerate range can never reach
    /// the sampling loop.
    pub fn new(profile: ChannelProfile) -> Result<Self, ConfigError> {
        profile.validate()?;
        let noise_floor = profile.noise_floor();
        let zero = ZeroTracker::new(profile.zero_offset, noise_floor);
        Ok(Self {
            profile,
            window: RollingWindow::new(SAMPLE_WINDOW),
            zero,
            status: 0,
            raw_pressure: 0.0,
            raw_pressure_avg: 0.0,
            pressure: 0.0,
            temperature: 0.0,
            consecutive_failures: 0,
        })
    }

    /// Decode one raw frame and update all derived state.
    ///
    /// Frame layout: two big-endian 16-bit words. W0 carries two status
    /// bits and 14 bits of pressure counts; W1 carries 11 bits of
    /// temperature counts in its high bits.
    pub fn decode(&mut self, frame: [u8; 4]) {
        let w0 = u16::from_be_bytes([frame[0], frame[1]]);
        let w1 = u16::from_be_bytes([frame[2], frame[3]]);

        self.status = (w0 >> 14) as u8;
        let pressure_counts = w0 & 0x3FFF;
        let temperature_counts = w1 >> 5;

        self.raw_pressure = self.profile.counts_to_value(pressure_counts);
        self.temperature = (temperature_counts as f64 / 2047.0) * 200.0 - 50.0;

        self.raw_pressure_avg = self.window.push(self.raw_pressure);
        let offset = self.zero.update(self.raw_pressure_avg);
        self.pressure = self.raw_pressure_avg - offset;

        self.consecutive_failures = 0;
    }

    /// Record a failed bus read. Returns the consecutive failure count so
    /// the caller can escalate its logging if a device goes quiet.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    /// Calibrated pressure (rolling average minus zero offset), in the
    /// profile's unit.
    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    /// Calibrated pressure converted to centimetres of water.
    pub fn pressure_as_cmh2o(&self) -> f64 {
        self.pressure * self.profile.unit.cmh2o_per_unit()
    }

    /// Latest temperature in degrees Celsius.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Latest instantaneous (unaveraged) pressure.
    pub fn raw_pressure(&self) -> f64 {
        self.raw_pressure
    }

    /// Rolling average of the instantaneous pressure.
    pub fn raw_pressure_avg(&self) -> f64 {
        self.raw_pressure_avg
    }

    /// Current zero offset.
    pub fn zero_offset(&self) -> f64 {
        self.zero.offset
    }

    /// Status bits from the last frame (top two bits of W0).
    ///
    /// Exposed but never enforced; the documented stale/invalid codes are
    /// for the caller to interpret.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Consecutive failed bus reads since the last good frame.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// The calibration profile this channel was built from.
    pub fn profile(&self) -> &ChannelProfile {
        &self.profile
    }

    /// Snapshot the channel for sink fan-out.
    pub fn reading(&self, flow: Option<f64>) -> ChannelReading {
        ChannelReading {
            pressure: self.pressure,
            pressure_cmh2o: self.pressure_as_cmh2o(),
            temperature: self.temperature,
            zero_offset: self.zero.offset,
            raw_pressure: self.raw_pressure,
            raw_pressure_avg: self.raw_pressure_avg,
            flow,
        }
    }
}

/// Immutable per-tick snapshot of a channel, handed to every sink.
///
/// Sinks only ever see a snapshot taken after both channels updated, so no
/// sink can observe a half-updated tick.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReading {
    pub pressure: f64,
    pub pressure_cmh2o: f64,
    pub temperature: f64,
    pub zero_offset: f64,
    pub raw_pressure: f64,
    pub raw_pressure_avg: f64,
    /// Smoothed flow, present only on the differential channel.
    pub flow: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{absolute_pressure_profile, differential_flow_profile};

    fn frame(status: u8, pressure_counts: u16, temperature_counts: u16) -> [u8; 4] {
        let w0 = ((status as u16) << 14) | (pressure_counts & 0x3FFF);
        let w1 = temperature_counts << 5;
        let w0b = w0.to_be_bytes();
        let w1b = w1.to_be_bytes();
        [w0b[0], w0b[1], w1b[0], w1b[1]]
    }

    #[test]
    fn test_decode_splits_words() {
        let mut channel = SensorChannel::new(absolute_pressure_profile()).unwrap();
        channel.decode(frame(0b10, 8192, 1023));

        assert_eq!(channel.status(), 0b10);
        // Mid-span counts land near mid-range, pre-zero-correction.
        assert!((channel.raw_pressure() - 15.0).abs() < 0.01);
        // 1023/2047 * 200 - 50
        assert!((channel.temperature() - 49.9511).abs() < 0.001);
    }

    #[test]
    fn test_temperature_transfer_endpoints() {
        let mut channel = SensorChannel::new(absolute_pressure_profile()).unwrap();
        channel.decode(frame(0, 8192, 0));
        assert!((channel.temperature() - -50.0).abs() < 1e-9);
        channel.decode(frame(0, 8192, 2047));
        assert!((channel.temperature() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_sample_average_is_undercounted() {
        let mut channel = SensorChannel::new(differential_flow_profile()).unwrap();
        channel.decode(frame(0, 14745, 0));
        // One sample of 1.0 psi averages to 1/40 during the fill phase.
        assert!((channel.raw_pressure_avg() - 1.0 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_warmup_geometric_convergence() {
        let mut tracker = ZeroTracker::new(0.5, 1e-4);
        let target = 0.125;
        let rate = 2.0 / 300.0;

        let mut expected_err = 0.5 - target;
        for _ in 0..300 {
            tracker.update(target);
            expected_err *= 1.0 - rate;
        }
        assert!((tracker.offset - target - expected_err).abs() < 1e-12);
        // After 300 steps at rate 2/300 the residual is ~13% of the
        // initial error.
        assert!((tracker.offset - target).abs() < 0.14 * (0.5 - target));
    }

    #[test]
    fn test_zero_steady_state_ignores_signal() {
        let mut tracker = ZeroTracker::new(0.0, 1e-3);
        for _ in 0..300 {
            tracker.update(0.0);
        }
        let settled = tracker.offset;

        // A real signal, far above the noise floor, must not move the zero.
        let after = tracker.update(0.5);
        assert_eq!(after, settled);

        // An average within the noise floor nudges it slowly.
        let nudged = tracker.update(settled + 5e-4);
        assert!(nudged > settled);
        assert!((nudged - settled).abs() < 5e-4);
    }

    #[test]
    fn test_failure_counter_resets_on_good_frame() {
        let mut channel = SensorChannel::new(absolute_pressure_profile()).unwrap();
        assert_eq!(channel.record_failure(), 1);
        assert_eq!(channel.record_failure(), 2);
        channel.decode(frame(0, 8192, 512));
        assert_eq!(channel.consecutive_failures(), 0);
    }

    #[test]
    fn test_failure_leaves_values_stale() {
        let mut channel = SensorChannel::new(absolute_pressure_profile()).unwrap();
        channel.decode(frame(0, 8192, 512));
        let before = channel.pressure();
        channel.record_failure();
        assert_eq!(channel.pressure(), before);
    }
}
