//! Setting key names and their value encodings
//!
//! Key names follow the platform they were inherited from so that
//! settings written by older builds keep their meaning.

use serde::{Deserialize, Serialize};

/// Device-wide airplane mode flag (global scope, 0 or 1).
pub const AIRPLANE_MODE_ON: &str = "airplane_mode_on";

/// Persisted Bluetooth power state (global scope, three-valued, see
/// [`RadioPowerSetting`]).
pub const BLUETOOTH_ON: &str = "bluetooth_on";

/// Wi-Fi power state (global scope, 0 means off).
pub const WIFI_ON: &str = "wifi_on";

/// How many times the passive toast has been shown (global scope).
pub const TOAST_COUNT: &str = "bluetooth_airplane_toast_count";

/// Whether the airplane mode enhancement feature is enabled (global scope).
pub const APM_ENHANCEMENT: &str = "apm_enhancement_enabled";

/// Whether Wi-Fi should remain on in airplane mode (secure scope).
pub const WIFI_APM_STATE: &str = "wifi_apm_state";

/// Whether the user has ever changed Bluetooth state while in airplane
/// mode (secure scope, [`UNUSED`]/[`USED`]).
pub const APM_USER_TOGGLED_BLUETOOTH: &str = "apm_user_toggled_bluetooth";

/// Whether Bluetooth should remain on in airplane mode (secure scope,
/// see [`ApmDesiredState`]).
pub const BLUETOOTH_APM_STATE: &str = "bluetooth_apm_state";

/// Whether the "wifi and bluetooth remain on" notification was shown
/// (secure scope).
pub const APM_WIFI_BT_NOTIFICATION: &str = "apm_wifi_bt_notification";

/// Whether the "bluetooth remains on" notification was shown (secure scope).
pub const APM_BT_NOTIFICATION: &str = "apm_bt_notification";

/// Whether the "bluetooth enabled in airplane mode" notification was
/// shown (secure scope).
pub const APM_BT_ENABLED_NOTIFICATION: &str = "apm_bt_enabled_notification";

pub const NOTIFICATION_NOT_SHOWN: i32 = 0;
pub const NOTIFICATION_SHOWN: i32 = 1;
pub const UNUSED: i32 = 0;
pub const USED: i32 = 1;

/// Three-valued persisted Bluetooth power state.
///
/// `OnForAirplaneMode` is a distinct sentinel, not a boolean collapse:
/// downstream consumers can tell "the user turned it on" apart from
/// "policy kept it on while airplane mode is active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioPowerSetting {
    /// Radio is off
    Off,
    /// Radio is on
    On,
    /// Radio stayed on through an airplane mode transition
    OnForAirplaneMode,
}

impl RadioPowerSetting {
    pub fn as_int(self) -> i32 {
        match self {
            RadioPowerSetting::Off => 0,
            RadioPowerSetting::On => 1,
            RadioPowerSetting::OnForAirplaneMode => 2,
        }
    }

    /// Decode a persisted value. Unknown values are treated as off.
    pub fn from_int(value: i32) -> Self {
        match value {
            1 => RadioPowerSetting::On,
            2 => RadioPowerSetting::OnForAirplaneMode,
            _ => RadioPowerSetting::Off,
        }
    }

    /// Whether the radio is powered in this state
    pub fn is_powered(self) -> bool {
        self != RadioPowerSetting::Off
    }
}

/// The user's persisted preference for Bluetooth during airplane mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApmDesiredState {
    Off,
    On,
}

impl ApmDesiredState {
    pub fn as_int(self) -> i32 {
        match self {
            ApmDesiredState::Off => 0,
            ApmDesiredState::On => 1,
        }
    }

    pub fn from_int(value: i32) -> Self {
        if value == 1 {
            ApmDesiredState::On
        } else {
            ApmDesiredState::Off
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_power_round_trip() {
        for state in [
            RadioPowerSetting::Off,
            RadioPowerSetting::On,
            RadioPowerSetting::OnForAirplaneMode,
        ] {
            assert_eq!(RadioPowerSetting::from_int(state.as_int()), state);
        }
    }

    #[test]
    fn test_radio_power_unknown_is_off() {
        assert_eq!(RadioPowerSetting::from_int(-1), RadioPowerSetting::Off);
        assert_eq!(RadioPowerSetting::from_int(7), RadioPowerSetting::Off);
    }

    #[test]
    fn test_sentinel_is_powered() {
        assert!(RadioPowerSetting::OnForAirplaneMode.is_powered());
        assert!(RadioPowerSetting::On.is_powered());
        assert!(!RadioPowerSetting::Off.is_powered());
    }

    #[test]
    fn test_desired_state_from_int() {
        assert_eq!(ApmDesiredState::from_int(1), ApmDesiredState::On);
        assert_eq!(ApmDesiredState::from_int(0), ApmDesiredState::Off);
        assert_eq!(ApmDesiredState::from_int(3), ApmDesiredState::Off);
    }
}
