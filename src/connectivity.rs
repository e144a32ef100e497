//! Radio stack boundary
//!
//! The policy engine never talks to the radio stack directly; it sees
//! the [`ConnectivityController`] trait. The daemon wires in
//! [`RadioBridge`], which mirrors the externally reported radio state
//! and records which notifications were shown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::settings::{keys, FileSettingsStore, RadioPowerSetting, SettingsStore};

/// User-visible notices the policy can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Passive toast, shown at most [`crate::policy::MAX_TOAST_COUNT`] times
    ApmToast,
    /// "Wi-Fi and Bluetooth remain on in airplane mode"
    WifiAndRadioKeptOn,
    /// "Bluetooth remains on in airplane mode"
    RadioKeptOn,
    /// "Bluetooth enabled in airplane mode"
    RadioEnabled,
}

impl NotificationKind {
    /// Secure-scope key recording that this notice was shown, if any.
    /// The plain toast is tracked by the throttle counter instead.
    pub fn shown_flag_key(self) -> Option<&'static str> {
        match self {
            NotificationKind::ApmToast => None,
            NotificationKind::WifiAndRadioKeptOn => Some(keys::APM_WIFI_BT_NOTIFICATION),
            NotificationKind::RadioKeptOn => Some(keys::APM_BT_NOTIFICATION),
            NotificationKind::RadioEnabled => Some(keys::APM_BT_ENABLED_NOTIFICATION),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::ApmToast => write!(f, "APM_TOAST"),
            NotificationKind::WifiAndRadioKeptOn => write!(f, "WIFI_BT_KEPT_ON"),
            NotificationKind::RadioKeptOn => write!(f, "BT_KEPT_ON"),
            NotificationKind::RadioEnabled => write!(f, "BT_ENABLED"),
        }
    }
}

/// Queries and commands exchanged with the radio stack.
///
/// Queries are fast synchronous reads; commands are fire-and-forget.
/// All calls happen on the engine's dispatch task.
pub trait ConnectivityController {
    /// Whether the radio is currently powered
    fn is_radio_on(&self) -> bool;
    /// Whether an audio/media profile is actively connected
    fn is_media_connected(&self) -> bool;
    /// Forward the airplane mode change to the radio stack
    fn propagate_mode_change(&self, airplane_mode_on: bool);
    /// Show a user-visible notice
    fn send_notification(&self, kind: NotificationKind);
}

struct BridgeState {
    radio_on: AtomicBool,
    media_connected: AtomicBool,
}

/// Daemon-side [`ConnectivityController`].
///
/// Radio power and media state are fed in over IPC by the radio stack;
/// propagation and notifications are logged and their shown-flags
/// persisted. Cloning shares the underlying state.
#[derive(Clone)]
pub struct RadioBridge {
    state: Arc<BridgeState>,
    settings: FileSettingsStore,
}

impl RadioBridge {
    /// Create a bridge, seeding radio power from the persisted setting
    pub fn new(settings: FileSettingsStore) -> Self {
        let persisted = RadioPowerSetting::from_int(settings.global_int(keys::BLUETOOTH_ON, 0));
        Self {
            state: Arc::new(BridgeState {
                radio_on: AtomicBool::new(persisted.is_powered()),
                media_connected: AtomicBool::new(false),
            }),
            settings,
        }
    }

    /// Record a radio power change reported by the radio stack
    pub fn set_radio_power(&self, on: bool) {
        self.state.radio_on.store(on, Ordering::SeqCst);
        let setting = if on {
            RadioPowerSetting::On
        } else {
            RadioPowerSetting::Off
        };
        self.settings
            .set_global_int(keys::BLUETOOTH_ON, setting.as_int());
    }

    /// Record a media profile connect/disconnect
    pub fn set_media_connected(&self, connected: bool) {
        self.state.media_connected.store(connected, Ordering::SeqCst);
    }
}

impl ConnectivityController for RadioBridge {
    fn is_radio_on(&self) -> bool {
        self.state.radio_on.load(Ordering::SeqCst)
    }

    fn is_media_connected(&self) -> bool {
        self.state.media_connected.load(Ordering::SeqCst)
    }

    fn propagate_mode_change(&self, airplane_mode_on: bool) {
        info!(airplane_mode_on, "propagating mode change to radio stack");
        if airplane_mode_on {
            // The stack powers the radio down in response
            self.state.radio_on.store(false, Ordering::SeqCst);
            self.settings
                .set_global_int(keys::BLUETOOTH_ON, RadioPowerSetting::Off.as_int());
        }
    }

    fn send_notification(&self, kind: NotificationKind) {
        info!(%kind, "notification requested");
        if let Some(key) = kind.shown_flag_key() {
            self.settings.set_secure_int(key, keys::NOTIFICATION_SHOWN);
        }
    }
}
