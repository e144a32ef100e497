//! Session telemetry
//!
//! One [`ApmSessionReport`] is emitted per airplane-mode session, at the
//! moment the mode turns back off. The record is a snapshot assembled in
//! full before any session flag is reset.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Snapshot of one airplane-mode session, taken when the mode ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApmSessionReport {
    /// Bluetooth power when airplane mode turned on
    pub bluetooth_on_before_toggle: bool,
    /// Whether policy chose to keep the radio up
    pub bluetooth_on_after_toggle: bool,
    /// Actual Bluetooth power when airplane mode turned off
    pub bluetooth_on_now: bool,
    /// Whether the user has ever toggled Bluetooth in airplane mode
    pub user_toggled_ever: bool,
    /// Whether the user toggled Bluetooth during this session
    pub user_toggled_during_apm: bool,
    /// Whether that first toggle landed within a minute of entering
    pub user_toggled_within_minute: bool,
    /// Media profile state when airplane mode turned on
    pub media_connected_before_toggle: bool,
}

/// Destination for session reports
pub trait TelemetrySink {
    fn report_session(&self, report: &ApmSessionReport);
}

/// Production sink: structured log line plus one JSON line appended to a
/// file under the data directory.
pub struct JsonlTelemetry {
    path: PathBuf,
}

impl JsonlTelemetry {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    fn append(&self, report: &ApmSessionReport) -> std::io::Result<()> {
        let mut line = serde_json::to_string(report)?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl TelemetrySink for JsonlTelemetry {
    fn report_session(&self, report: &ApmSessionReport) {
        info!(
            bluetooth_on_before = report.bluetooth_on_before_toggle,
            bluetooth_on_after = report.bluetooth_on_after_toggle,
            bluetooth_on_now = report.bluetooth_on_now,
            user_toggled_ever = report.user_toggled_ever,
            user_toggled_during_apm = report.user_toggled_during_apm,
            user_toggled_within_minute = report.user_toggled_within_minute,
            media_connected_before = report.media_connected_before_toggle,
            "airplane mode session reported"
        );

        if let Err(e) = self.append(report) {
            warn!(?e, path = ?self.path, "failed to append telemetry record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ApmSessionReport {
        ApmSessionReport {
            bluetooth_on_before_toggle: true,
            bluetooth_on_after_toggle: true,
            bluetooth_on_now: false,
            user_toggled_ever: false,
            user_toggled_during_apm: true,
            user_toggled_within_minute: false,
            media_connected_before_toggle: true,
        }
    }

    #[test]
    fn test_report_serialization() {
        let json = serde_json::to_string(&sample_report()).unwrap();
        assert!(json.contains("bluetooth_on_before_toggle"));
        assert!(json.contains("media_connected_before_toggle"));
    }

    #[test]
    fn test_jsonl_sink_appends_one_line_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.jsonl");
        let sink = JsonlTelemetry::new(&path);

        sink.report_session(&sample_report());
        sink.report_session(&sample_report());

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: ApmSessionReport = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, sample_report());
    }
}
