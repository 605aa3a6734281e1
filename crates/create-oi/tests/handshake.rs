//! Handshake behavior against a simulated robot.

mod common;

use std::time::{Duration, Instant};

use create_oi::mock::MockLink;
use create_oi::{Connection, ConnectionState, DriverError, HANDSHAKE_MAX_ATTEMPTS};
use pretty_assertions::assert_eq;

use common::{inject_after, init_tracing, shared_decoder, CORRUPT_FRAME, VALID_FRAME};

#[test]
fn connect_succeeds_when_robot_responds_promptly() {
    init_tracing();
    let mock = MockLink::new();
    let mut conn = Connection::new(Some(shared_decoder()));

    // Robot starts streaming 50 ms after being prompted.
    inject_after(&mock, Duration::from_millis(50), vec![VALID_FRAME]);

    let start = Instant::now();
    conn.connect_with(Box::new(mock.clone()), None)
        .expect("connect should succeed on the first attempt");

    // First attempt: well within one 500 ms handshake window.
    assert!(start.elapsed() < Duration::from_millis(500));
    assert_eq!(conn.state(), ConnectionState::Connected);
    assert!(conn.is_reading());
    assert_eq!(conn.total_packets(), 1);
    assert_eq!(conn.num_corrupt_packets(), 0);

    // Exactly one prompt was needed.
    let starts = mock.get_written().iter().filter(|&&b| b == 128).count();
    assert_eq!(starts, 1);
}

#[test]
fn corrupt_packets_do_not_satisfy_the_handshake() {
    init_tracing();
    let mock = MockLink::new();
    let mut conn = Connection::new(Some(shared_decoder()));

    // Three corrupt frames of line noise, then one good packet.
    mock.inject_read(&[CORRUPT_FRAME, CORRUPT_FRAME, CORRUPT_FRAME, VALID_FRAME]);

    conn.connect_with(Box::new(mock.clone()), None)
        .expect("the valid packet should satisfy the wait");

    assert_eq!(conn.num_corrupt_packets(), 3);
    assert_eq!(conn.total_packets(), 4);

    // Still succeeded within the first attempt.
    let starts = mock.get_written().iter().filter(|&&b| b == 128).count();
    assert_eq!(starts, 1);
}

#[test]
fn connect_fails_after_retry_budget_is_exhausted() {
    init_tracing();
    let mock = MockLink::new();
    let mut conn = Connection::new(Some(shared_decoder()));

    let start = Instant::now();
    let err = conn
        .connect_with(Box::new(mock.clone()), None)
        .expect_err("a silent robot must fail the handshake");
    let elapsed = start.elapsed();

    assert!(matches!(err, DriverError::HandshakeTimeout));

    // 10 x 500 ms of waiting, allowing scheduling jitter.
    assert!(elapsed >= Duration::from_millis(4800), "gave up too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(8), "waited too long: {:?}", elapsed);

    // The robot was re-prompted on every timeout.
    let starts = mock.get_written().iter().filter(|&&b| b == 128).count();
    assert_eq!(starts, HANDSHAKE_MAX_ATTEMPTS as usize);

    // Failure leaves the system fully disconnected.
    assert!(!conn.connected());
    assert!(!conn.is_reading());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[test]
fn connect_fails_fast_without_a_decoder() {
    init_tracing();
    let mock = MockLink::new();
    let mut conn = Connection::new(None);

    let err = conn
        .connect_with(Box::new(mock.clone()), None)
        .expect_err("missing data holder must fail connect");
    assert!(matches!(err, DriverError::MissingDecoder));

    // Failed before any traffic was sent.
    assert!(mock.get_written().is_empty());
    assert!(!conn.connected());
}
