//! Lifetime-bounded toast counter
//!
//! The passive "Bluetooth stays on" toast may be shown at most
//! [`MAX_TOAST_COUNT`] times over the device's lifetime. The count is
//! persisted and only ever grows; nothing in this daemon resets it.

use tracing::debug;

use crate::settings::{keys, SettingsStore};

/// Hard cap on how many toasts a device ever shows
pub const MAX_TOAST_COUNT: u32 = 10;

/// Persisted, monotonic counter gating the passive toast.
#[derive(Debug)]
pub struct NotificationThrottle {
    count: u32,
    max: u32,
}

impl NotificationThrottle {
    pub fn new() -> Self {
        Self {
            count: 0,
            max: MAX_TOAST_COUNT,
        }
    }

    /// Read the persisted count. Called once, when the engine starts.
    pub fn load(&mut self, settings: &impl SettingsStore) {
        self.count = settings.global_int(keys::TOAST_COUNT, 0).max(0) as u32;
        debug!(count = self.count, "toast count loaded");
    }

    /// Request permission to show one toast.
    ///
    /// Granted if and only if the pre-increment count is below the cap;
    /// on grant the incremented count is persisted immediately.
    pub fn try_pop(&mut self, settings: &impl SettingsStore) -> bool {
        if self.count >= self.max {
            return false;
        }
        self.count += 1;
        settings.set_global_int(keys::TOAST_COUNT, self.count as i32);
        true
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Map-backed store, enough for throttle persistence
    #[derive(Default)]
    struct MapStore {
        global: Mutex<HashMap<String, i32>>,
    }

    impl SettingsStore for MapStore {
        fn global_int(&self, key: &str, default: i32) -> i32 {
            self.global
                .lock()
                .unwrap()
                .get(key)
                .copied()
                .unwrap_or(default)
        }

        fn set_global_int(&self, key: &str, value: i32) {
            self.global.lock().unwrap().insert(key.to_owned(), value);
        }

        fn secure_int(&self, _key: &str, default: i32) -> i32 {
            default
        }

        fn set_secure_int(&self, _key: &str, _value: i32) {}
    }

    #[test]
    fn test_grants_until_cap_then_denies() {
        let store = MapStore::default();
        let mut throttle = NotificationThrottle::new();
        throttle.load(&store);

        for i in 1..=MAX_TOAST_COUNT {
            assert!(throttle.try_pop(&store), "pop {} should be granted", i);
            assert_eq!(store.global_int(keys::TOAST_COUNT, 0), i as i32);
        }

        // The eleventh request is denied and the counter stops moving
        assert!(!throttle.try_pop(&store));
        assert!(!throttle.try_pop(&store));
        assert_eq!(throttle.count(), MAX_TOAST_COUNT);
        assert_eq!(store.global_int(keys::TOAST_COUNT, 0), MAX_TOAST_COUNT as i32);
    }

    #[test]
    fn test_load_resumes_persisted_count() {
        let store = MapStore::default();
        store.set_global_int(keys::TOAST_COUNT, 9);

        let mut throttle = NotificationThrottle::new();
        throttle.load(&store);

        assert!(throttle.try_pop(&store));
        assert!(!throttle.try_pop(&store));
    }

    #[test]
    fn test_load_clamps_negative_count() {
        let store = MapStore::default();
        store.set_global_int(keys::TOAST_COUNT, -3);

        let mut throttle = NotificationThrottle::new();
        throttle.load(&store);
        assert_eq!(throttle.count(), 0);
    }
}
