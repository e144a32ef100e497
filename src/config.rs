//! Configuration loading and management

use std::path::PathBuf;

use anyhow::Result;

/// Radio name for Bluetooth in the airplane-mode radio list
pub const RADIO_BLUETOOTH: &str = "bluetooth";

/// Radios subject to airplane mode when nothing is configured
const DEFAULT_RADIOS: &str = "cell,bluetooth,wifi,nfc,wimax";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Persisted settings file
    pub settings_path: PathBuf,

    /// Session telemetry file (one JSON record per line)
    pub telemetry_path: PathBuf,

    /// Radios the platform subjects to airplane mode. A radio missing
    /// from this list permanently disables its policy engine.
    pub airplane_mode_radios: Vec<String>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("radio-policyd");

        let radios =
            std::env::var("RADIO_POLICYD_RADIOS").unwrap_or_else(|_| DEFAULT_RADIOS.to_owned());

        Ok(Self {
            socket_path: data_dir.join("daemon.sock"),
            settings_path: data_dir.join("settings.json"),
            telemetry_path: data_dir.join("sessions.jsonl"),
            data_dir,
            airplane_mode_radios: radios
                .split(',')
                .map(|radio| radio.trim().to_owned())
                .filter(|radio| !radio.is_empty())
                .collect(),
        })
    }

    /// Whether `radio` is subject to airplane mode on this platform
    pub fn radio_included(&self, radio: &str) -> bool {
        self.airplane_mode_radios.iter().any(|r| r == radio)
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
