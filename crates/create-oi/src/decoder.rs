//! Packet decoder interface
//!
//! The driver does not understand the sensor packet grammar. It feeds raw
//! bytes to a caller-supplied decoder and reacts when the decoder reports a
//! complete, validated packet batch.

use std::sync::{Arc, Mutex};

/// Consumes the raw OI byte stream and maintains decoded sensor state.
///
/// Implementations own the packet framing, checksum validation and the
/// corrupt/total counters. Counters are monotonically non-decreasing for
/// the lifetime of the decoder and may be read from the caller's thread
/// while the reader thread is feeding bytes.
pub trait PacketDecoder: Send {
    /// Byte sequence that asks the robot to begin streaming the sensor
    /// packets this decoder expects (a `Stream` opcode plus packet IDs).
    fn stream_request(&self) -> Vec<u8>;

    /// Feed one byte of the incoming stream.
    ///
    /// Returns `true` when the byte completes a full packet batch, in which
    /// case the driver calls [`validate_all`](PacketDecoder::validate_all).
    fn process_byte(&mut self, byte: u8) -> bool;

    /// Finalize the packet batch that just completed.
    ///
    /// Returns `true` if the batch checked out. Corrupt batches are counted
    /// internally and return `false`; they are not an error from the
    /// driver's point of view — the stream simply continues.
    fn validate_all(&mut self) -> bool;

    /// Number of corrupt packets seen since construction.
    fn num_corrupt_packets(&self) -> u64;

    /// Total number of packets seen since construction.
    fn total_packets(&self) -> u64;
}

/// Shared handle to the decoder, updated from the reader thread and
/// inspected from the caller's thread.
pub type SharedDecoder = Arc<Mutex<dyn PacketDecoder>>;
