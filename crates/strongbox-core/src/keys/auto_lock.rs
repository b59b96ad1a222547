//! Inactivity deadline and the background watcher that enforces it.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Mutex, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use super::KeyManager;
use crate::error::Result;

/// Deadline-based idle timer. Disarmed while the vault is locked.
pub(crate) struct AutoLockTimer {
    window: Duration,
    deadline: Mutex<Option<Instant>>,
}

impl AutoLockTimer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: Mutex::new(None),
        }
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }

    fn enabled(&self) -> bool {
        !self.window.is_zero()
    }

    pub(crate) fn arm(&self, now: Instant) {
        if self.enabled() {
            *self.deadline() = Some(now + self.window);
        }
    }

    pub(crate) fn disarm(&self) {
        *self.deadline() = None;
    }

    /// Push the deadline out. No effect when disarmed.
    pub(crate) fn touch(&self, now: Instant) {
        let mut deadline = self.deadline();
        if deadline.is_some() {
            *deadline = Some(now + self.window);
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        matches!(*self.deadline(), Some(deadline) if now >= deadline)
    }

    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    fn deadline(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background thread polling a manager for idle expiry.
///
/// Dropping the handle stops the thread.
pub struct AutoLockWatcher {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutoLockWatcher {
    pub(crate) fn spawn(manager: Weak<KeyManager>, poll: Duration) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("strongbox-auto-lock".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(poll) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if manager.check_idle() {
                    debug!("auto-lock watcher locked the vault");
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the watcher and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutoLockWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
