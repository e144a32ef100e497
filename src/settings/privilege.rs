//! Scoped caller-identity elevation for secure-scope writes
//!
//! Secure settings are owned by the foreground user and normally only
//! writable by privileged callers. The store performs those writes on
//! behalf of arbitrary callers, so it swaps the effective identity to
//! the system identity for the duration of the write and restores the
//! previous identity on every exit path, including panics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::trace;

/// Identity with unrestricted settings access.
pub const SYSTEM_UID: u32 = 1000;

/// Tracks the effective caller identity for settings writes.
#[derive(Debug, Clone)]
pub struct PrivilegeBroker {
    effective_uid: Arc<AtomicU32>,
}

impl PrivilegeBroker {
    /// Create a broker for the given caller identity
    pub fn new(caller_uid: u32) -> Self {
        Self {
            effective_uid: Arc::new(AtomicU32::new(caller_uid)),
        }
    }

    /// The identity writes are currently attributed to
    pub fn effective_uid(&self) -> u32 {
        self.effective_uid.load(Ordering::SeqCst)
    }

    /// Whether the current effective identity may write secure settings
    pub fn can_write_secure(&self) -> bool {
        self.effective_uid() == SYSTEM_UID
    }

    /// Switch the effective identity to the system identity.
    ///
    /// The previous identity is restored when the returned guard drops.
    pub fn elevate(&self) -> ElevationGuard<'_> {
        let saved = self.effective_uid.swap(SYSTEM_UID, Ordering::SeqCst);
        trace!(saved_uid = saved, "elevated to system identity");
        ElevationGuard {
            broker: self,
            saved_uid: saved,
        }
    }
}

impl Default for PrivilegeBroker {
    fn default() -> Self {
        Self::new(SYSTEM_UID)
    }
}

/// Restores the pre-elevation identity on drop.
#[must_use = "the elevation ends as soon as the guard is dropped"]
pub struct ElevationGuard<'a> {
    broker: &'a PrivilegeBroker,
    saved_uid: u32,
}

impl Drop for ElevationGuard<'_> {
    fn drop(&mut self) {
        self.broker
            .effective_uid
            .store(self.saved_uid, Ordering::SeqCst);
        trace!(restored_uid = self.saved_uid, "restored caller identity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevate_and_restore() {
        let broker = PrivilegeBroker::new(10042);
        assert!(!broker.can_write_secure());

        {
            let _guard = broker.elevate();
            assert_eq!(broker.effective_uid(), SYSTEM_UID);
            assert!(broker.can_write_secure());
        }

        assert_eq!(broker.effective_uid(), 10042);
        assert!(!broker.can_write_secure());
    }

    #[test]
    fn test_restore_on_panic() {
        let broker = PrivilegeBroker::new(10042);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = broker.elevate();
            panic!("write failed");
        }));

        assert!(result.is_err());
        assert_eq!(broker.effective_uid(), 10042);
    }

    #[test]
    fn test_system_caller_already_privileged() {
        let broker = PrivilegeBroker::default();
        assert!(broker.can_write_secure());

        let guard = broker.elevate();
        assert_eq!(broker.effective_uid(), SYSTEM_UID);
        drop(guard);
        assert_eq!(broker.effective_uid(), SYSTEM_UID);
    }
}
