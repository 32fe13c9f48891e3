//! Measurement framing for network telemetry.
//!
//! Each measurement is framed two ways: a fixed 12-byte network-byte-order
//! record for the UDP wire, and a JSON mirror carrying the same fields for
//! logging and downstream tooling.

use serde::Serialize;

/// Size of one encoded measurement record.
pub const RECORD_SIZE: usize = 12;

/// Event tag for a measurement record.
pub const EVENT_MEASUREMENT: u8 = b'M';

/// Event-type tag: temperature, degrees Celsius x100.
pub const KIND_TEMPERATURE: u8 = b'T';

/// Event-type tag: airway pressure, cmH2O x10.
pub const KIND_PRESSURE: u8 = b'D';

/// Event-type tag: flow, standard millilitres per minute x1000.
pub const KIND_FLOW: u8 = b'F';

/// Location tag: airway sensor cluster.
pub const LOC_AIRWAY: u8 = b'A';

/// One measurement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Event tag.
    pub event: u8,
    /// Event-type tag.
    pub kind: u8,
    /// Location tag.
    pub location: u8,
    /// Numeric id distinguishing devices at one location.
    pub id: i8,
    /// Milliseconds since session start.
    pub ms: u32,
    /// Scaled integer value.
    pub value: i32,
}

/// JSON mirror of a measurement record. Field order matches the binary
/// layout.
#[derive(Serialize)]
struct MeasurementMirror {
    event: String,
    #[serde(rename = "type")]
    kind: String,
    ms: u32,
    loc: String,
    num: i8,
    val: i32,
}

impl Measurement {
    /// Measurement at the airway location, device 0.
    pub fn airway(kind: u8, ms: u32, value: i32) -> Self {
        Self {
            event: EVENT_MEASUREMENT,
            kind,
            location: LOC_AIRWAY,
            id: 0,
            ms,
            value,
        }
    }

    /// Encode as the fixed 12-byte network-byte-order record.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0] = self.event;
        buf[1] = self.kind;
        buf[2] = self.location;
        buf[3] = self.id as u8;
        buf[4..8].copy_from_slice(&self.ms.to_be_bytes());
        buf[8..12].copy_from_slice(&self.value.to_be_bytes());
        buf
    }

    /// JSON mirror with fields identical to the binary record.
    pub fn to_json(&self) -> String {
        let mirror = MeasurementMirror {
            event: (self.event as char).to_string(),
            kind: (self.kind as char).to_string(),
            ms: self.ms,
            loc: (self.location as char).to_string(),
            num: self.id,
            val: self.value,
        };
        // Flat struct of primitives; serialization cannot fail.
        serde_json::to_string(&mirror).unwrap_or_default()
    }
}
