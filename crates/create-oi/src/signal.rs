//! Safe shutdown on process-termination signals
//!
//! On SIGINT/SIGTERM the robot must not be left powered in an active mode.
//! A watcher thread sends the same Start-then-Stop sequence as `disconnect`
//! before the process dies. This is best-effort cleanup racing process
//! teardown: the wait on the link is bounded so the handler can never hang
//! the exit.

use std::io;
use std::sync::TryLockError;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::backend::Handle;
use signal_hook::iterator::Signals;
use signal_hook::low_level;
use tracing::{info, warn};

use crate::driver::SharedLink;
use crate::opcode::Opcode;

const SIGNAL_LOCK_BUDGET: Duration = Duration::from_millis(500);

/// Watches for termination signals and forces the robot to a safe state.
///
/// Installed once per driver instance on the first connect; torn down when
/// the driver is dropped.
pub(crate) struct SignalWatcher {
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    pub fn new() -> Self {
        Self {
            handle: None,
            thread: None,
        }
    }

    /// Register for SIGINT/SIGTERM. No-op if already installed.
    pub fn install(&mut self, link: SharedLink) -> io::Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        self.handle = Some(signals.handle());

        let thread = std::thread::Builder::new()
            .name("oi-signal-watcher".to_string())
            .spawn(move || {
                for sig in signals.forever() {
                    info!("received signal {}, stopping robot before exit", sig);
                    safe_stop(&link);
                    let _ = low_level::emulate_default_handler(sig);
                }
            })?;
        self.thread = Some(thread);
        Ok(())
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Send Start then Stop on the link, if one is open.
///
/// Uses `try_lock` with a deadline rather than a blocking lock: if another
/// thread holds the link past the budget, the stop is skipped and teardown
/// proceeds anyway.
fn safe_stop(link: &SharedLink) {
    let deadline = Instant::now() + SIGNAL_LOCK_BUDGET;
    loop {
        match link.try_lock() {
            Ok(mut guard) => {
                if let Some(link) = guard.as_mut() {
                    let _ = link.write_all(&[u8::from(Opcode::Start)]);
                    let _ = link.write_all(&[u8::from(Opcode::Stop)]);
                    let _ = link.flush();
                }
                return;
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                let mut guard = poisoned.into_inner();
                if let Some(link) = guard.as_mut() {
                    let _ = link.write_all(&[u8::from(Opcode::Start)]);
                    let _ = link.write_all(&[u8::from(Opcode::Stop)]);
                    let _ = link.flush();
                }
                return;
            }
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    warn!("link busy during signal shutdown, skipping safe stop");
                    return;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SerialLink;
    use crate::mock::MockLink;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_safe_stop_sends_start_then_stop() {
        let mock = MockLink::new();
        let boxed: Box<dyn SerialLink> = Box::new(mock.clone());
        let link: SharedLink = Arc::new(Mutex::new(Some(boxed)));

        safe_stop(&link);

        assert_eq!(mock.get_written(), vec![128, 173]);
    }

    #[test]
    fn test_safe_stop_without_link_is_noop() {
        let link: SharedLink = Arc::new(Mutex::new(None));
        // Must return promptly and not panic.
        safe_stop(&link);
    }
}
