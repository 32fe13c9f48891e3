//! Serial transducer bus adapter.
//!
//! The transducers hang off an addressed serial bus: writing a device's
//! one-byte address triggers a conversion readback of exactly four bytes.

use crate::bus::{BusError, FrameSource, RawFrame};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::info;

const BAUD_RATE: u32 = 115_200;
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Frame source backed by a serial port.
pub struct SerialFrameSource {
    port: Box<dyn SerialPort>,
    address: u8,
}

impl SerialFrameSource {
    /// Open `path` and address the device at `address`.
    ///
    /// Failing to open the port is a construction-time error; the caller
    /// treats it as fatal.
    pub fn open(path: &str, address: u8) -> Result<Self, BusError> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| BusError::Io(format!("{path}: {e}")))?;
        info!("opened {path} for device 0x{address:02x}");
        Ok(Self { port, address })
    }
}

impl FrameSource for SerialFrameSource {
    fn read_frame(&mut self) -> Result<RawFrame, BusError> {
        self.port
            .write_all(&[self.address])
            .map_err(|e| BusError::Io(e.to_string()))?;

        let mut frame: RawFrame = [0; 4];
        self.port
            .read_exact(&mut frame)
            .map_err(|e| BusError::Io(e.to_string()))?;
        Ok(frame)
    }
}
