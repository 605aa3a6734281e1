#![allow(dead_code)]
//! Shared test fixtures: a minimal packet decoder and tracing setup.

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use create_oi::mock::MockLink;
use create_oi::{Opcode, PacketDecoder, SharedDecoder};

/// Single-byte frame the decoder treats as a valid packet
pub const VALID_FRAME: u8 = 0xAA;
/// Single-byte frame the decoder counts as corrupt
pub const CORRUPT_FRAME: u8 = 0xBB;

/// Sensor packet ID the test decoder streams
pub const TEST_PACKET_ID: u8 = 7;

/// Minimal decoder: every `VALID_FRAME` or `CORRUPT_FRAME` byte completes a
/// one-byte packet batch; anything else is stream noise.
pub struct TestDecoder {
    pending: u8,
    corrupt: u64,
    total: u64,
}

impl TestDecoder {
    pub fn new() -> Self {
        Self {
            pending: 0,
            corrupt: 0,
            total: 0,
        }
    }
}

impl PacketDecoder for TestDecoder {
    fn stream_request(&self) -> Vec<u8> {
        vec![u8::from(Opcode::Stream), 1, TEST_PACKET_ID]
    }

    fn process_byte(&mut self, byte: u8) -> bool {
        self.pending = byte;
        byte == VALID_FRAME || byte == CORRUPT_FRAME
    }

    fn validate_all(&mut self) -> bool {
        self.total += 1;
        if self.pending == CORRUPT_FRAME {
            self.corrupt += 1;
            false
        } else {
            true
        }
    }

    fn num_corrupt_packets(&self) -> u64 {
        self.corrupt
    }

    fn total_packets(&self) -> u64 {
        self.total
    }
}

pub fn shared_decoder() -> SharedDecoder {
    Arc::new(Mutex::new(TestDecoder::new()))
}

/// Inject bytes into the mock link from a helper thread after a delay,
/// simulating a robot that takes a moment to start streaming.
pub fn inject_after(mock: &MockLink, delay: Duration, bytes: Vec<u8>) {
    let mock = mock.clone();
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        mock.inject_read(&bytes);
    });
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
