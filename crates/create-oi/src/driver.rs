//! Connection lifecycle and handshake
//!
//! Handles the connect/disconnect surface and proves the robot is alive
//! before `connect` succeeds.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::decoder::SharedDecoder;
use crate::error::{DriverError, Result};
use crate::link::{open_link, SerialLink};
use crate::opcode::Opcode;
use crate::reader::{HandshakeSignal, StreamReader};
use crate::signal::SignalWatcher;
use crate::{HANDSHAKE_ATTEMPT_TIMEOUT, HANDSHAKE_MAX_ATTEMPTS, PORT_SETTLE_DELAY};

/// Shared handle to the open link.
///
/// The caller's thread writes commands through it, the signal watcher takes
/// a bounded `try_lock` on it during shutdown. The reader thread never
/// touches it; reads go through an independent clone.
pub(crate) type SharedLink = Arc<Mutex<Option<Box<dyn SerialLink>>>>;

/// Notification invoked from the reader thread once per validated packet
/// batch, starting with the one that completes the handshake.
pub type PacketCallback = Arc<dyn Fn() + Send + Sync>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connecting (handshake in progress)
    Connecting,
    /// Connected and streaming
    Connected,
}

/// Serial connection to the robot.
///
/// Owns the link, the background reader and the handshake state. Dropping
/// the connection disconnects, which forces the robot back to a safe power
/// mode before the port closes.
pub struct Connection {
    link: SharedLink,
    decoder: Option<SharedDecoder>,
    reader: StreamReader,
    signal: Arc<HandshakeSignal>,
    callback: Option<PacketCallback>,
    watcher: SignalWatcher,
    state: ConnectionState,
}

impl Connection {
    /// Create a new connection (not yet connected).
    ///
    /// The decoder is the shared sensor-data holder; `connect` fails with
    /// [`DriverError::MissingDecoder`] if none was supplied.
    pub fn new(decoder: Option<SharedDecoder>) -> Self {
        Self {
            link: Arc::new(Mutex::new(None)),
            decoder,
            reader: StreamReader::new(),
            signal: Arc::new(HandshakeSignal::new()),
            callback: None,
            watcher: SignalWatcher::new(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the physical link is open
    pub fn connected(&self) -> bool {
        self.lock_link().is_some()
    }

    /// Open the serial port and perform the handshake.
    ///
    /// The baud rate must match the robot's fixed protocol rate or the
    /// handshake never completes. On failure the port is closed again and
    /// no partial state remains.
    pub fn connect(
        &mut self,
        port_name: &str,
        baud: u32,
        callback: Option<PacketCallback>,
    ) -> Result<()> {
        if self.connected() {
            return Err(DriverError::AlreadyConnected);
        }
        // Fail before touching hardware if the data holder is missing.
        if self.decoder.is_none() {
            return Err(DriverError::MissingDecoder);
        }

        let link = open_link(port_name, baud)?;

        // Opening the port toggles the control lines; give the robot time
        // to settle before the first OI command.
        std::thread::sleep(PORT_SETTLE_DELAY);

        self.attach(link, callback)
    }

    /// Perform the handshake over an already-open link.
    ///
    /// Used with loopback links such as [`crate::mock::MockLink`]; skips
    /// the physical-port settle delay.
    pub fn connect_with(
        &mut self,
        link: Box<dyn SerialLink>,
        callback: Option<PacketCallback>,
    ) -> Result<()> {
        if self.connected() {
            return Err(DriverError::AlreadyConnected);
        }
        self.attach(link, callback)
    }

    fn attach(&mut self, link: Box<dyn SerialLink>, callback: Option<PacketCallback>) -> Result<()> {
        if self.decoder.is_none() {
            return Err(DriverError::MissingDecoder);
        }

        self.state = ConnectionState::Connecting;
        *self.lock_link() = Some(link);

        if let Err(e) = self.watcher.install(Arc::clone(&self.link)) {
            warn!("could not install signal watcher: {}", e);
        }

        self.callback = callback;

        match self.start_reading() {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                debug!("connected");
                Ok(())
            }
            Err(e) => {
                self.callback = None;
                *self.lock_link() = None;
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Start the streaming reader and wait for the first validated packet.
    ///
    /// No-op if the reader is already running. Commands the robot into
    /// Passive mode, requests the sensor stream, then waits up to 500 ms per
    /// attempt for ten attempts, re-prompting the robot on every timeout.
    pub fn start_reading(&mut self) -> Result<()> {
        if !self.connected() {
            return Err(DriverError::NotConnected);
        }
        let decoder = self.decoder.clone().ok_or(DriverError::MissingDecoder)?;

        // Only allow once
        if self.reader.is_running() {
            return Ok(());
        }

        self.send_opcode(Opcode::Start)?;
        self.start_sensor_stream(&decoder)?;

        let reader_link = {
            let mut guard = self.lock_link();
            let link = guard.as_mut().ok_or(DriverError::NotConnected)?;
            link.try_clone()?
        };

        self.reader.start(
            reader_link,
            Arc::clone(&decoder),
            Arc::clone(&self.signal),
            self.callback.clone(),
        );
        if !self.reader.is_running() {
            return Err(DriverError::SerialError("reader thread did not start".into()));
        }

        let mut attempts = 1;
        while !self.signal.wait_ready(HANDSHAKE_ATTEMPT_TIMEOUT) {
            if attempts >= HANDSHAKE_MAX_ATTEMPTS {
                warn!(
                    "no data from robot after {} attempts; check that it is powered",
                    attempts
                );
                self.reader.stop(&self.signal);
                return Err(DriverError::HandshakeTimeout);
            }
            attempts += 1;
            debug!("handshake attempt {}", attempts);

            // The robot may need to be re-prompted.
            let reissue = self
                .send_opcode(Opcode::Start)
                .and_then(|_| self.start_sensor_stream(&decoder));
            if let Err(e) = reissue {
                self.reader.stop(&self.signal);
                return Err(e);
            }
        }

        Ok(())
    }

    /// Stop the streaming reader and join its thread.
    ///
    /// After this returns no decode or notification callback can fire, and
    /// the handshake signal is re-armed for the next connect cycle.
    pub fn stop_reading(&mut self) {
        self.reader.stop(&self.signal);
    }

    /// Whether the background read loop is active
    pub fn is_reading(&self) -> bool {
        self.reader.is_running()
    }

    /// Close the connection.
    ///
    /// Stops the reader first so no further bytes are processed, then sends
    /// Start followed by Stop. The robot only honors Stop from a known OI
    /// mode, so Passive mode is forced first regardless of the current mode.
    /// Idempotent: disconnecting when already disconnected is a no-op.
    pub fn disconnect(&mut self) {
        self.reader.stop(&self.signal);

        if self.connected() {
            if let Err(e) = self.send_opcode(Opcode::Start) {
                debug!("disconnect: start opcode failed: {}", e);
            }
            if let Err(e) = self.send_opcode(Opcode::Stop) {
                debug!("disconnect: stop opcode failed: {}", e);
            }
            // Dropping the handle closes the port.
            *self.lock_link() = None;
        }

        self.callback = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Write raw bytes to the robot.
    ///
    /// Fails with [`DriverError::NotConnected`] while disconnected. Success
    /// only confirms the bytes reached the local transmit buffer. Safe to
    /// call while the reader is streaming; reads and writes use independent
    /// handles.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.lock_link();
        let link = guard.as_mut().ok_or_else(|| {
            warn!("send failed, not connected");
            DriverError::NotConnected
        })?;
        link.write_all(bytes)?;
        link.flush()?;
        Ok(())
    }

    /// Write a single opcode byte
    pub fn send_opcode(&mut self, code: Opcode) -> Result<()> {
        self.send(&[u8::from(code)])
    }

    /// Number of corrupt packets counted by the decoder
    pub fn num_corrupt_packets(&self) -> u64 {
        self.with_decoder(|d| d.num_corrupt_packets())
    }

    /// Total number of packets counted by the decoder
    pub fn total_packets(&self) -> u64 {
        self.with_decoder(|d| d.total_packets())
    }

    fn with_decoder(&self, f: impl FnOnce(&dyn crate::PacketDecoder) -> u64) -> u64 {
        match &self.decoder {
            Some(decoder) => match decoder.lock() {
                Ok(guard) => f(&*guard),
                Err(poisoned) => f(&*poisoned.into_inner()),
            },
            None => 0,
        }
    }

    fn start_sensor_stream(&mut self, decoder: &SharedDecoder) -> Result<()> {
        let request = match decoder.lock() {
            Ok(guard) => guard.stream_request(),
            Err(poisoned) => poisoned.into_inner().stream_request(),
        };
        self.send(&request)
    }

    fn lock_link(&self) -> MutexGuard<'_, Option<Box<dyn SerialLink>>> {
        match self.link.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection_is_disconnected() {
        let conn = Connection::new(None);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.connected());
        assert!(!conn.is_reading());
    }

    #[test]
    fn test_counters_default_to_zero_without_decoder() {
        let conn = Connection::new(None);
        assert_eq!(conn.num_corrupt_packets(), 0);
        assert_eq!(conn.total_packets(), 0);
    }
}
