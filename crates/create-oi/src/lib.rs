//! # create-oi
//!
//! Serial driver for the iRobot Create 2 Open Interface (OI).
//!
//! This crate owns the connection lifecycle for a single point-to-point
//! serial link to the robot:
//! - opening and configuring the physical port (8N1, no flow control),
//! - a bounded-retry handshake that proves sensor data is actually flowing
//!   before `connect` succeeds,
//! - a dedicated background reader thread that feeds the byte stream to a
//!   caller-supplied packet decoder,
//! - fail-safe shutdown: the robot is forced back into Passive mode and
//!   stopped before the port is closed, on explicit `disconnect`, on drop,
//!   and on SIGINT/SIGTERM.
//!
//! The packet grammar itself is not implemented here. Callers supply a
//! [`PacketDecoder`] that consumes one byte at a time and reports when a
//! complete packet batch has been validated.
//!
//! ## Example
//!
//! ```rust,ignore
//! use create_oi::{Connection, SharedDecoder};
//! use std::sync::{Arc, Mutex};
//!
//! let decoder: SharedDecoder = Arc::new(Mutex::new(my_decoder));
//! let mut conn = Connection::new(Some(decoder));
//! conn.connect("/dev/ttyUSB0", create_oi::DEFAULT_BAUD_RATE, None)?;
//! // ... drive the robot ...
//! conn.disconnect();
//! ```

#![warn(missing_docs)]

use std::time::Duration;

mod decoder;
mod driver;
mod error;
mod link;
pub mod mock;
mod opcode;
mod reader;
mod signal;

pub use decoder::{PacketDecoder, SharedDecoder};
pub use driver::{Connection, ConnectionState, PacketCallback};
pub use error::{DriverError, Result};
pub use link::{open_link, SerialLink, SerialPortLink};
pub use opcode::Opcode;

/// Baud rate of the Create 2 OI serial protocol.
///
/// The robot speaks at a fixed rate; connecting at any other rate means the
/// handshake never completes.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Per-attempt wait for the first validated packet during the handshake.
pub const HANDSHAKE_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

/// Number of handshake attempts before `connect` gives up.
pub const HANDSHAKE_MAX_ATTEMPTS: u32 = 10;

/// Settle time after opening the physical port, before any traffic.
///
/// Opening the port toggles control lines; the robot needs a moment before
/// it accepts OI commands reliably.
pub const PORT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Read timeout on the link; also bounds how long `stop` waits for the
/// reader thread to notice the stop flag.
pub(crate) const READ_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
