//! Mock serial link for testing
//!
//! A loopback [`SerialLink`] with an injectable read queue and a captured
//! write log, so the full connect/handshake/disconnect path can be driven
//! without hardware.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::link::SerialLink;
use crate::READ_POLL_TIMEOUT;

/// Mock link for unit and integration testing
#[derive(Clone)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

struct MockLinkInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    read_timeout: Duration,
    fail_reads: bool,
}

impl MockLink {
    /// Create a new mock link
    pub fn new() -> Self {
        MockLink {
            inner: Arc::new(Mutex::new(MockLinkInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                read_timeout: READ_POLL_TIMEOUT,
                fail_reads: false,
            })),
        }
    }

    /// Inject bytes to be read by the driver
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.lock();
        inner.read_buffer.extend(data);
    }

    /// Get all bytes the driver has written so far
    pub fn get_written(&self) -> Vec<u8> {
        self.lock().write_buffer.clone()
    }

    /// Clear the captured write log
    pub fn clear_written(&self) {
        self.lock().write_buffer.clear();
    }

    /// Make subsequent reads fail with a hard I/O error (not a timeout)
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockLinkInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = {
            let inner = self.lock();
            Instant::now() + inner.read_timeout
        };

        loop {
            {
                let mut inner = self.lock();
                if inner.fail_reads {
                    return Err(io::Error::new(io::ErrorKind::Other, "mock link failure"));
                }
                if !inner.read_buffer.is_empty() {
                    let available = inner.read_buffer.len().min(buf.len());
                    for item in buf.iter_mut().take(available) {
                        // Queue is non-empty for the first `available` pops.
                        *item = inner.read_buffer.pop_front().unwrap_or_default();
                    }
                    return Ok(available);
                }
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "mock read timeout"));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        inner.write_buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.lock().read_timeout = timeout;
        Ok(())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        let mut inner = self.lock();
        inner.read_buffer.clear();
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_returns_injected_bytes() {
        let mut link = MockLink::new();
        link.inject_read(&[1, 2, 3]);

        let mut buf = [0u8; 2];
        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(link.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 3);
    }

    #[test]
    fn test_empty_read_times_out() {
        let mut link = MockLink::new();
        link.set_timeout(Duration::from_millis(10)).unwrap();

        let mut buf = [0u8; 1];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_clones_share_buffers() {
        let link = MockLink::new();
        let mut clone = link.try_clone().unwrap();

        clone.write_all(&[128, 173]).unwrap();
        assert_eq!(link.get_written(), vec![128, 173]);
    }
}
