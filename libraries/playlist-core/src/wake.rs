//! Network wake coordination
//!
//! Streaming needs the host to keep the network awake. The wake resource is
//! not reference counted: it is acquired once when streaming begins and
//! released once when it ends, however many times either is requested.

use std::sync::Arc;
use tracing::debug;

/// Host side of the wake resource
pub trait NetworkWakeLock: Send + Sync {
    fn acquire(&self);

    fn release(&self);
}

/// Wake lock for hosts that do not need one
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWakeLock;

impl NetworkWakeLock for NoWakeLock {
    fn acquire(&self) {}

    fn release(&self) {}
}

/// Held wake resource; dropping it releases the resource
pub struct WakeGuard {
    lock: Arc<dyn NetworkWakeLock>,
}

impl WakeGuard {
    fn acquire(lock: &Arc<dyn NetworkWakeLock>) -> Self {
        lock.acquire();
        Self {
            lock: Arc::clone(lock),
        }
    }
}

impl Drop for WakeGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Holds at most one [`WakeGuard`]
pub struct NetworkWakeCoordinator {
    lock: Arc<dyn NetworkWakeLock>,
    guard: Option<WakeGuard>,
}

impl NetworkWakeCoordinator {
    pub fn new(lock: Arc<dyn NetworkWakeLock>) -> Self {
        Self { lock, guard: None }
    }

    /// Hold the resource while streaming, release it otherwise
    pub fn update(&mut self, streaming: bool) {
        if streaming {
            self.acquire();
        } else {
            self.release();
        }
    }

    pub fn acquire(&mut self) {
        if self.guard.is_none() {
            debug!("Acquiring network wake resource");
            self.guard = Some(WakeGuard::acquire(&self.lock));
        }
    }

    /// Release the resource (idempotent)
    pub fn release(&mut self) {
        if self.guard.take().is_some() {
            debug!("Released network wake resource");
        }
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}
