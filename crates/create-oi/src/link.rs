//! Serial link transport
//!
//! Provides low-level serial port access for the OI byte stream.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::{DriverError, Result};
use crate::READ_POLL_TIMEOUT;

/// Abstraction over the physical byte-stream channel.
///
/// Reads and writes on independent clones may run concurrently; the reader
/// thread reads on its own clone while the caller's thread writes commands.
pub trait SerialLink: Read + Write + Send {
    /// Set the timeout for blocking reads
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard any pending input and output
    fn clear_buffers(&mut self) -> io::Result<()>;

    /// Clone the channel for use from another thread
    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>>;
}

/// Serial port wrapper implementing [`SerialLink`]
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialPortLink {
    /// Wrap an already-open serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialPortLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialPortLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialPortLink {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        let port_clone = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(SerialPortLink::new(port_clone)))
    }
}

/// Open and configure a serial port for the OI protocol.
///
/// The OI is 8 data bits, no parity, one stop bit, no flow control. The
/// short read timeout keeps the reader thread responsive to `stop`.
pub fn open_link(name: &str, baud: u32) -> Result<Box<dyn SerialLink>> {
    let mut port = serialport::new(name, baud)
        .timeout(READ_POLL_TIMEOUT)
        .open()
        .map_err(|e| DriverError::ConnectionFailed(e.to_string()))?;

    configure_port(port.as_mut())?;

    Ok(Box::new(SerialPortLink::new(port)))
}

/// Apply the 8N1 line configuration the robot expects
fn configure_port(port: &mut dyn SerialPort) -> Result<()> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| DriverError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| DriverError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| DriverError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| DriverError::SerialError(e.to_string()))?;
    Ok(())
}
