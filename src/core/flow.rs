//! Volumetric flow derived from differential pressure.
//!
//! Orifice law: flow is proportional to the square root of the pressure
//! drop across the restriction. The sign of the pressure is carried onto
//! the flow so bidirectional (reversed) flow reads negative.

use crate::config::PressureUnit;
use crate::core::window::RollingWindow;

/// Samples averaged by the flow smoothing window.
const FLOW_WINDOW: usize = 40;

/// Seconds-to-minutes rate conversion.
const PER_MINUTE: f64 = 60.0;

/// Derives and smooths flow from a differential channel's calibrated
/// pressure.
pub struct FlowDerivation {
    k: f64,
    pascals_per_unit: f64,
    window: RollingWindow,
    flow: f64,
}

impl FlowDerivation {
    /// Create a derivation with orifice coefficient `k` for pressures
    /// expressed in `unit`.
    pub fn new(k: f64, unit: PressureUnit) -> Self {
        Self {
            k,
            pascals_per_unit: unit.pascals_per_unit(),
            window: RollingWindow::new(FLOW_WINDOW),
            flow: 0.0,
        }
    }

    /// Fold one calibrated pressure sample in and return the smoothed
    /// flow (standard millilitres per minute).
    pub fn update(&mut self, pressure: f64) -> f64 {
        let pa = pressure * self.pascals_per_unit;
        let instantaneous = self.k * pa.abs().sqrt().copysign(pressure) * PER_MINUTE;
        self.flow = self.window.push(instantaneous);
        self.flow
    }

    /// The latest smoothed flow.
    pub fn flow(&self) -> f64 {
        self.flow
    }

    /// The orifice coefficient.
    pub fn coefficient(&self) -> f64 {
        self.k
    }
}
