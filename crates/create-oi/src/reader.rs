//! Streaming reader
//!
//! Runs the read/decode chain on a dedicated thread: read one byte, hand it
//! to the decoder, read the next. The handshake waits on [`HandshakeSignal`]
//! until the first validated packet batch arrives.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::decoder::SharedDecoder;
use crate::driver::PacketCallback;
use crate::link::SerialLink;

/// One-shot "first data arrived" signal, re-armed whenever the reader stops.
///
/// Single producer (the reader thread), single consumer (the `connect`
/// caller). Setting an already-set signal is a no-op, so a burst of packet
/// completions before the waiter wakes collapses to one logical ready state.
pub(crate) struct HandshakeSignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl HandshakeSignal {
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        match self.ready.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mark data as ready and wake the waiter. Idempotent.
    pub fn notify(&self) {
        let mut ready = self.lock();
        if !*ready {
            *ready = true;
            self.cond.notify_one();
        }
    }

    /// Block until the signal is set or the timeout elapses.
    ///
    /// Returns whether the signal was set. The predicate is re-checked after
    /// every wakeup, so spurious wakeups never count as success.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.lock();
        while !*ready {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = deadline - now;
            match self.cond.wait_timeout(ready, wait) {
                Ok((guard, _)) => ready = guard,
                Err(poisoned) => ready = poisoned.into_inner().0,
            }
        }
        true
    }

    /// Re-arm for the next connect cycle.
    pub fn reset(&self) {
        *self.lock() = false;
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        *self.lock()
    }
}

/// Owns the background read loop: Idle when no thread is running, Running
/// while one is.
pub(crate) struct StreamReader {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StreamReader {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Spawn the read/decode loop on its own thread.
    ///
    /// The caller passes an independent clone of the link so reads never
    /// contend with command writes on the caller's thread.
    pub fn start(
        &mut self,
        link: Box<dyn SerialLink>,
        decoder: SharedDecoder,
        signal: Arc<HandshakeSignal>,
        callback: Option<PacketCallback>,
    ) {
        if self.thread.is_some() {
            return;
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);

        let handle = std::thread::Builder::new()
            .name("oi-reader".to_string())
            .spawn(move || read_loop(link, decoder, signal, callback, running));

        match handle {
            Ok(handle) => self.thread = Some(handle),
            Err(e) => {
                error!("failed to spawn reader thread: {}", e);
                self.running.store(false, Ordering::Release);
            }
        }
    }

    /// Stop the loop and join the thread.
    ///
    /// When this returns, no further decode or notification callback can
    /// fire, and the handshake signal is re-armed for the next cycle.
    pub fn stop(&mut self, signal: &HandshakeSignal) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("reader thread panicked");
            }
        }
        signal.reset();
    }
}

/// The read chain: one byte per iteration for the lifetime of Running.
///
/// A short read timeout doubles as the stop-flag poll interval. A hard
/// transport error ends the chain without clearing the Running state; the
/// stream stays stalled until an explicit stop/start cycle.
fn read_loop(
    mut link: Box<dyn SerialLink>,
    decoder: SharedDecoder,
    signal: Arc<HandshakeSignal>,
    callback: Option<PacketCallback>,
    running: Arc<AtomicBool>,
) {
    debug!("reader thread started");
    let mut byte = [0u8; 1];

    while running.load(Ordering::Acquire) {
        match link.read(&mut byte) {
            Ok(1) => {
                let batch_valid = {
                    let Ok(mut decoder) = decoder.lock() else {
                        error!("decoder mutex poisoned; stopping read chain");
                        break;
                    };
                    if decoder.process_byte(byte[0]) {
                        Some(decoder.validate_all())
                    } else {
                        None
                    }
                };

                if batch_valid == Some(true) {
                    signal.notify();
                    if let Some(cb) = &callback {
                        cb();
                    }
                }
            }
            // Framing is one byte at a time; any other size is dropped.
            Ok(_) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                error!("serial read error: {}", e);
                break;
            }
        }
    }

    debug!("reader thread exiting");
}
