//! Integer settings store with global and per-user secure scopes
//!
//! The engine only ever sees the [`SettingsStore`] trait; the daemon
//! wires in [`FileSettingsStore`], a JSON file persisted after every
//! write. Writes are best-effort: a failed persist leaves the in-memory
//! value in place and is logged, never surfaced to the caller (the next
//! transition re-derives its decision from live state anyway).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::privilege::PrivilegeBroker;

/// Scoped integer key/value access.
///
/// Global scope is device-wide; secure scope is per foreground user.
/// Secure writes are performed under an elevated identity regardless of
/// who the caller is.
pub trait SettingsStore {
    fn global_int(&self, key: &str, default: i32) -> i32;
    fn set_global_int(&self, key: &str, value: i32);
    fn secure_int(&self, key: &str, default: i32) -> i32;
    fn set_secure_int(&self, key: &str, value: i32);
}

/// Errors from loading or persisting the settings file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// On-disk shape of the store
#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsData {
    /// Device-wide values
    global: HashMap<String, i32>,
    /// Per-user values, keyed by user id
    secure: HashMap<u32, HashMap<String, i32>>,
    /// User whose secure scope reads and writes resolve to
    foreground_user: u32,
}

struct Inner {
    path: PathBuf,
    data: SettingsData,
    /// Senders nudged on every write of the watched key, changed or not
    watchers: HashMap<String, Vec<mpsc::Sender<()>>>,
}

/// JSON-file-backed [`SettingsStore`], cheap to clone and share.
#[derive(Clone)]
pub struct FileSettingsStore {
    inner: Arc<Mutex<Inner>>,
    broker: PrivilegeBroker,
}

impl FileSettingsStore {
    /// Load the store from `path`, starting empty if the file is missing
    pub fn load(path: &Path, broker: PrivilegeBroker) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            debug!(?path, "no settings file, starting empty");
            SettingsData::default()
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path: path.to_owned(),
                data,
                watchers: HashMap::new(),
            })),
            broker,
        })
    }

    /// Register a sender that is nudged whenever `key` is written in the
    /// global scope. Duplicate writes of the same value still nudge;
    /// deduplication is the receiver's concern.
    pub fn watch_key(&self, key: &str, tx: mpsc::Sender<()>) {
        let mut inner = self.lock();
        inner.watchers.entry(key.to_owned()).or_default().push(tx);
    }

    /// User id whose secure scope is currently active
    pub fn foreground_user(&self) -> u32 {
        self.lock().data.foreground_user
    }

    /// Switch the active secure scope to another user
    pub fn set_foreground_user(&self, user: u32) {
        let mut inner = self.lock();
        inner.data.foreground_user = user;
        inner.persist_logged();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoning only means a writer panicked mid-update; the map is
        // still a usable snapshot.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for FileSettingsStore {
    fn global_int(&self, key: &str, default: i32) -> i32 {
        self.lock().data.global.get(key).copied().unwrap_or(default)
    }

    fn set_global_int(&self, key: &str, value: i32) {
        let mut inner = self.lock();
        inner.data.global.insert(key.to_owned(), value);
        inner.persist_logged();
        inner.notify(key);
    }

    fn secure_int(&self, key: &str, default: i32) -> i32 {
        let inner = self.lock();
        let user = inner.data.foreground_user;
        inner
            .data
            .secure
            .get(&user)
            .and_then(|scope| scope.get(key))
            .copied()
            .unwrap_or(default)
    }

    fn set_secure_int(&self, key: &str, value: i32) {
        // Waive the per-caller permission check for this write only;
        // the guard restores the caller identity on every exit path.
        let _elevated = self.broker.elevate();

        let mut inner = self.lock();
        let user = inner.data.foreground_user;
        inner
            .data
            .secure
            .entry(user)
            .or_default()
            .insert(key.to_owned(), value);
        inner.persist_logged();
    }
}

impl Inner {
    fn persist(&self) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!(?e, path = ?self.path, "failed to persist settings");
        }
    }

    /// Nudge every watcher of `key`. Closed or full receivers are
    /// skipped; a lagging consumer re-reads the value anyway.
    fn notify(&mut self, key: &str) {
        if let Some(watchers) = self.watchers.get_mut(key) {
            watchers.retain(|tx| match tx.try_send(()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(())) => true,
                Err(mpsc::error::TrySendError::Closed(())) => false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::keys;

    fn temp_store() -> (FileSettingsStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FileSettingsStore::load(&dir.path().join("settings.json"), PrivilegeBroker::new(10042))
                .unwrap();
        (store, dir)
    }

    #[test]
    fn test_global_default_and_write() {
        let (store, _dir) = temp_store();
        assert_eq!(store.global_int(keys::AIRPLANE_MODE_ON, 0), 0);

        store.set_global_int(keys::AIRPLANE_MODE_ON, 1);
        assert_eq!(store.global_int(keys::AIRPLANE_MODE_ON, 0), 1);
    }

    #[test]
    fn test_secure_scope_is_per_user() {
        let (store, _dir) = temp_store();

        store.set_secure_int(keys::WIFI_APM_STATE, 1);
        assert_eq!(store.secure_int(keys::WIFI_APM_STATE, 0), 1);

        store.set_foreground_user(10);
        assert_eq!(store.foreground_user(), 10);
        assert_eq!(store.secure_int(keys::WIFI_APM_STATE, 0), 0);

        store.set_foreground_user(0);
        assert_eq!(store.secure_int(keys::WIFI_APM_STATE, 0), 1);
    }

    #[test]
    fn test_secure_write_elevates_unprivileged_caller() {
        let (store, _dir) = temp_store();
        // Caller uid 10042 cannot write secure settings directly; the
        // store elevates around the write.
        store.set_secure_int(keys::APM_USER_TOGGLED_BLUETOOTH, keys::USED);
        assert_eq!(
            store.secure_int(keys::APM_USER_TOGGLED_BLUETOOTH, keys::UNUSED),
            keys::USED
        );
        // Identity restored after the write
        assert_eq!(store.broker.effective_uid(), 10042);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = FileSettingsStore::load(&path, PrivilegeBroker::default()).unwrap();
        store.set_global_int(keys::TOAST_COUNT, 7);
        store.set_secure_int(keys::BLUETOOTH_APM_STATE, 1);
        drop(store);

        let reloaded = FileSettingsStore::load(&path, PrivilegeBroker::default()).unwrap();
        assert_eq!(reloaded.global_int(keys::TOAST_COUNT, 0), 7);
        assert_eq!(reloaded.secure_int(keys::BLUETOOTH_APM_STATE, 0), 1);
    }

    #[test]
    fn test_watcher_nudged_on_every_write() {
        let (store, _dir) = temp_store();
        let (tx, mut rx) = mpsc::channel(8);
        store.watch_key(keys::AIRPLANE_MODE_ON, tx);

        store.set_global_int(keys::AIRPLANE_MODE_ON, 1);
        // Same value again: still a nudge, dedup happens downstream
        store.set_global_int(keys::AIRPLANE_MODE_ON, 1);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_watcher_ignores_other_keys() {
        let (store, _dir) = temp_store();
        let (tx, mut rx) = mpsc::channel(8);
        store.watch_key(keys::AIRPLANE_MODE_ON, tx);

        store.set_global_int(keys::WIFI_ON, 1);
        assert!(rx.try_recv().is_err());
    }
}
