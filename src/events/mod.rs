//! Event types flowing in and out of the policy engine
//!
//! Inbound events are marshaled onto the engine's single dispatch
//! queue; outbound decision events are broadcast to subscribed IPC
//! clients.

use serde::{Deserialize, Serialize};

use crate::connectivity::NotificationKind;
use crate::telemetry::ApmSessionReport;

/// Inputs delivered to the engine, serially, on its one dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvent {
    /// The device-wide airplane mode setting was written (possibly to
    /// the same value; the engine deduplicates)
    ModeSettingChanged,

    /// The user manually changed radio power
    UserToggledRadio { turned_on: bool },
}

/// Outcomes the engine broadcasts as it runs the decision table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionEvent {
    /// Airplane mode turned on but the radio was kept up, so the mode
    /// change was not propagated to the radio stack
    RadioKeptOn { media_connected: bool },

    /// The mode change was forwarded to the radio stack
    ModeChangePropagated { airplane_mode_on: bool },

    /// A user-visible notice was requested
    NotificationRequested { kind: NotificationKind },

    /// Airplane mode ended and the session snapshot was emitted
    SessionReported { report: ApmSessionReport },
}

impl std::fmt::Display for DecisionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionEvent::RadioKeptOn { media_connected } => {
                write!(f, "RADIO_KEPT_ON (media_connected={})", media_connected)
            }
            DecisionEvent::ModeChangePropagated { airplane_mode_on } => {
                write!(f, "MODE_CHANGE_PROPAGATED (on={})", airplane_mode_on)
            }
            DecisionEvent::NotificationRequested { kind } => {
                write!(f, "NOTIFICATION_REQUESTED ({})", kind)
            }
            DecisionEvent::SessionReported { .. } => write!(f, "SESSION_REPORTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_event_serialization() {
        let event = DecisionEvent::RadioKeptOn {
            media_connected: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("radio_kept_on"));
        assert!(json.contains("true"));
    }

    #[test]
    fn test_notification_event_serialization() {
        let event = DecisionEvent::NotificationRequested {
            kind: NotificationKind::WifiAndRadioKeptOn,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("notification_requested"));
        assert!(json.contains("wifi_and_radio_kept_on"));
    }

    #[test]
    fn test_decision_event_deserialization() {
        let json = r#"{"type":"mode_change_propagated","airplane_mode_on":false}"#;
        let event: DecisionEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            DecisionEvent::ModeChangePropagated {
                airplane_mode_on: false
            }
        ));
    }
}
