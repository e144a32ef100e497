//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::DecisionEvent;

/// Requests from clients (settings UI, radio stack) to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Write the device-wide airplane mode flag. The policy engine
    /// picks the change up through its settings subscription.
    SetAirplaneMode { on: bool },

    /// The radio stack reports a Bluetooth power change
    SetRadioPower { on: bool },

    /// The radio stack reports a media profile connect/disconnect
    SetMediaConnected { connected: bool },

    /// The user manually toggled Bluetooth; feed it to the engine
    NotifyRadioToggle { on: bool },

    /// Switch this connection to a stream of decision events
    Subscribe,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Request accepted
    Ack,

    /// Subscription confirmed; decision events follow
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push message to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The policy engine made a decision
    Decision(DecisionEvent),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Last written airplane mode flag
    pub airplane_mode_on: bool,

    /// Bluetooth power as last reported by the radio stack
    pub radio_on: bool,

    /// Whether a media profile is connected
    pub media_connected: bool,

    /// False when Bluetooth is excluded from airplane mode control
    pub policy_active: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SetAirplaneMode { on: true };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_airplane_mode"));
        assert!(json.contains("true"));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"notify_radio_toggle","on":false}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(req, Request::NotifyRadioToggle { on: false }));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus {
            version: "0.1.0".to_owned(),
            airplane_mode_on: true,
            radio_on: true,
            media_connected: false,
            policy_active: true,
            uptime_secs: 42,
        });
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("airplane_mode_on"));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::Decision(DecisionEvent::ModeChangePropagated {
            airplane_mode_on: true,
        });
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("decision"));
        assert!(json.contains("mode_change_propagated"));
    }
}
