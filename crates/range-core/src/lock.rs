//! Session-wide UI lock
//!
//! Held by the install job for its whole run. While held, every mutating
//! session operation fails fast with `RangeError::Locked`; selection stays
//! allowed. The guard releases on drop, so every exit path of the job
//! (completion, failure, cancellation, panic unwinding) unlocks.

use crate::error::RangeError;
use crate::events::{EventBus, SessionEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lock flag shared by the session and its guard
#[derive(Debug, Default)]
pub struct UiLock {
    held: AtomicBool,
}

impl UiLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Fail with `Locked` if held
    ///
    /// # Errors
    /// `RangeError::Locked`
    pub fn ensure_free(&self) -> Result<(), RangeError> {
        if self.is_held() {
            Err(RangeError::Locked)
        } else {
            Ok(())
        }
    }

    /// Take the lock, or `None` if someone else holds it
    pub(crate) fn try_acquire(self: &Arc<Self>, events: &EventBus) -> Option<UiLockGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        tracing::info!("ui lock acquired");
        events.publish(SessionEvent::LockChanged(true));
        Some(UiLockGuard {
            lock: Arc::clone(self),
            events: events.clone(),
        })
    }
}

/// Releases the UI lock when dropped
#[derive(Debug)]
pub struct UiLockGuard {
    lock: Arc<UiLock>,
    events: EventBus,
}

impl Drop for UiLockGuard {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
        tracing::info!("ui lock released");
        self.events.publish(SessionEvent::LockChanged(false));
    }
}
