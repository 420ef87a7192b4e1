//! Serial port transport built on the `serialport` crate

use super::ByteTransport;
use serialport::SerialPort;
use std::{
    io::{self, Read, Write},
    time::Duration,
};

const DEFAULT_TIMEOUT: f32 = 0.5;

/// A serial byte transport.
///
/// The port handle is created lazily on [`ByteTransport::open`] and dropped on
/// [`ByteTransport::close`], so a `Serial` can be constructed before the
/// device exists.
pub struct Serial {
    path: String,
    baud: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl Serial {
    /// Describe a serial transport at `path` (e.g. `/dev/ttyUSB0`) with a
    /// given baud rate. Nothing is opened until [`ByteTransport::open`].
    #[must_use]
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
            timeout: Duration::from_secs_f32(DEFAULT_TIMEOUT),
            port: None,
        }
    }

    /// Override the per-call read/write timeout applied when the port opens.
    /// The protocol layer has no timeout policy of its own; this is it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is not open"))
    }
}

impl ByteTransport for Serial {
    fn open(&mut self) -> io::Result<()> {
        if self.port.is_none() {
            let port = serialport::new(&self.path, self.baud)
                .timeout(self.timeout)
                .open()?;
            self.port = Some(port);
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the handle releases the device
        self.port = None;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port_mut()?.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port_mut()?.write(buf)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let pending = self.port_mut()?.bytes_to_read().map_err(io::Error::from)?;
        Ok(pending as usize)
    }
}

impl std::fmt::Debug for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serial")
            .field("path", &self.path)
            .field("baud", &self.baud)
            .field("open", &self.port.is_some())
            .finish()
    }
}
