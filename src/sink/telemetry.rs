//! Network telemetry sink.
//!
//! On each outer decimation boundary the sink frames two measurements —
//! airway pressure in cmH2O x10 and flow x1000 — and a temperature
//! measurement (x100) on a slower inner cadence. Binary records go out as
//! one fire-and-forget UDP datagram each; the JSON mirrors are traced for
//! local inspection. Send failures are never surfaced.

use crate::core::ChannelReading;
use crate::sink::OutputSink;
use crate::telemetry::{Measurement, KIND_FLOW, KIND_PRESSURE, KIND_TEMPERATURE};
use std::net::UdpSocket;
use std::time::Duration;
use tracing::{debug, warn};

/// UDP telemetry sink with outer and inner decimation.
pub struct TelemetrySink {
    every: u32,
    countdown: u32,
    temperature_every: u32,
    temperature_countdown: u32,
    socket: Option<UdpSocket>,
    destination: Option<String>,
}

impl TelemetrySink {
    /// Create a sink firing every `every` ticks, with temperature on a
    /// 1-in-`temperature_every` inner cadence. With no destination the
    /// sink still frames measurements (and traces the mirrors) but sends
    /// nothing.
    pub fn new(every: u32, temperature_every: u32, destination: Option<String>) -> Self {
        let socket = destination.as_ref().and_then(|dest| {
            match UdpSocket::bind("0.0.0.0:0") {
                Ok(socket) => {
                    debug!("telemetry socket bound for {dest}");
                    Some(socket)
                }
                Err(e) => {
                    warn!("could not bind telemetry socket: {e}");
                    None
                }
            }
        });
        Self {
            every,
            countdown: every,
            temperature_every,
            temperature_countdown: temperature_every,
            socket,
            destination,
        }
    }

    /// Frame the measurements for one firing, in emission order.
    fn measurements(
        &mut self,
        pressure: &ChannelReading,
        flow: &ChannelReading,
        ms: u32,
    ) -> Vec<Measurement> {
        let mut out = Vec::with_capacity(3);

        self.temperature_countdown -= 1;
        if self.temperature_countdown == 0 {
            self.temperature_countdown = self.temperature_every;
            out.push(Measurement::airway(
                KIND_TEMPERATURE,
                ms,
                scale(flow.temperature, 100.0),
            ));
        }

        out.push(Measurement::airway(
            KIND_PRESSURE,
            ms,
            scale(pressure.pressure_cmh2o, 10.0),
        ));
        out.push(Measurement::airway(
            KIND_FLOW,
            ms,
            scale(flow.flow.unwrap_or(0.0), 1000.0),
        ));

        out
    }
}

/// Scale a reading to its wire integer representation.
fn scale(value: f64, factor: f64) -> i32 {
    (value * factor).round() as i32
}

impl OutputSink for TelemetrySink {
    fn output(&mut self, pressure: &ChannelReading, flow: &ChannelReading, elapsed: Duration) {
        self.countdown -= 1;
        if self.countdown != 0 {
            return;
        }
        self.countdown = self.every;

        let ms = (elapsed.as_secs_f64() * 1000.0).round() as u32;
        for measurement in self.measurements(pressure, flow, ms) {
            if let (Some(socket), Some(dest)) = (&self.socket, &self.destination) {
                let _ = socket.send_to(&measurement.to_bytes(), dest.as_str());
            }
            debug!(target: "telemetry", "{}", measurement.to_json());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RECORD_SIZE;

    fn reading(pressure: f64, temperature: f64, flow: Option<f64>) -> ChannelReading {
        ChannelReading {
            pressure,
            pressure_cmh2o: pressure * 70.30696,
            temperature,
            zero_offset: 0.0,
            raw_pressure: pressure,
            raw_pressure_avg: pressure,
            flow,
        }
    }

    #[test]
    fn test_measurement_set_and_scaling() {
        let mut sink = TelemetrySink::new(20, 200, None);
        let p = reading(0.1, 24.0, None);
        let f = reading(0.001, 25.504, Some(12.3456));

        let ms = sink.measurements(&p, &f, 1000);
        // Inner cadence has not fired yet: pressure then flow.
        assert_eq!(ms.len(), 2);
        assert_eq!(ms[0].kind, KIND_PRESSURE);
        assert_eq!(ms[0].value, (0.1f64 * 70.30696 * 10.0).round() as i32);
        assert_eq!(ms[1].kind, KIND_FLOW);
        assert_eq!(ms[1].value, 12346);
    }

    #[test]
    fn test_temperature_on_inner_cadence() {
        let mut sink = TelemetrySink::new(20, 3, None);
        let p = reading(0.0, 24.0, None);
        let f = reading(0.0, 25.5, Some(0.0));

        assert_eq!(sink.measurements(&p, &f, 0).len(), 2);
        assert_eq!(sink.measurements(&p, &f, 0).len(), 2);

        // Third firing carries the temperature first.
        let ms = sink.measurements(&p, &f, 0);
        assert_eq!(ms.len(), 3);
        assert_eq!(ms[0].kind, KIND_TEMPERATURE);
        assert_eq!(ms[0].value, 2550);

        // Cadence restarts.
        assert_eq!(sink.measurements(&p, &f, 0).len(), 2);
    }

    #[test]
    fn test_datagram_per_record() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let dest = receiver.local_addr().unwrap().to_string();

        let mut sink = TelemetrySink::new(2, 100, Some(dest));
        let p = reading(0.1, 24.0, None);
        let f = reading(0.001, 25.5, Some(3.0));

        // Four ticks at every=2 fire twice, two records per firing.
        for i in 1..=4 {
            sink.output(&p, &f, Duration::from_millis(2 * i));
        }

        let mut buf = [0u8; 64];
        let mut received = Vec::new();
        for _ in 0..4 {
            let (n, _) = receiver.recv_from(&mut buf).unwrap();
            assert_eq!(n, RECORD_SIZE);
            received.push(buf[1]);
        }
        assert_eq!(received, vec![b'D', b'F', b'D', b'F']);
    }

    #[test]
    fn test_no_destination_is_silent() {
        let mut sink = TelemetrySink::new(1, 1, None);
        let p = reading(0.1, 24.0, None);
        let f = reading(0.0, 25.0, Some(0.0));
        // Must not panic without a socket.
        sink.output(&p, &f, Duration::from_millis(2));
    }

    #[test]
    fn test_ms_is_rounded_elapsed() {
        let mut sink = TelemetrySink::new(1, 100, None);
        let p = reading(0.0, 24.0, None);
        let f = reading(0.0, 25.0, Some(0.0));
        let ms = sink.measurements(&p, &f, 1234);
        assert!(ms.iter().all(|m| m.ms == 1234));
    }
}
