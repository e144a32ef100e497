//! Persisted integer settings
//!
//! Provides the key/value contract the policy engine reads its
//! configuration from, a file-backed implementation for the daemon,
//! and the scoped privilege elevation used around secure-scope writes.

pub mod keys;

mod privilege;
mod store;

pub use keys::{ApmDesiredState, RadioPowerSetting};
pub use privilege::{ElevationGuard, PrivilegeBroker};
pub use store::{FileSettingsStore, SettingsStore, StoreError};
