//! radio-policyd: airplane mode policy daemon for the Bluetooth radio
//!
//! Decides, whenever the device-wide airplane mode flag changes,
//! whether Bluetooth is actually powered down or kept running for an
//! active audio session, which notice the user sees, and how the
//! session is reported.
//!
//! Structure:
//! - Settings store with an airplane-mode change subscription
//! - Policy engine draining a single dispatch queue
//! - IPC server feeding external events in and decision events out

mod config;
mod connectivity;
mod events;
mod ipc;
mod lifecycle;
mod policy;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::connectivity::RadioBridge;
use crate::events::PolicyEvent;
use crate::ipc::{Server, ServerCtx};
use crate::lifecycle::ShutdownSignal;
use crate::policy::{MonotonicClock, PolicyEngine};
use crate::settings::{keys, FileSettingsStore, PrivilegeBroker};
use crate::telemetry::JsonlTelemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "radio-policyd starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.settings_path, "configuration loaded");

    let settings = FileSettingsStore::load(&config.settings_path, PrivilegeBroker::default())
        .context("failed to load settings store")?;

    // Channels for inter-component communication
    // Decision events: engine -> subscribed IPC clients
    let (decision_tx, _decision_rx) = broadcast::channel(64);
    // The engine's dispatch queue; everything it reacts to arrives here
    let (policy_tx, policy_rx) = mpsc::channel::<PolicyEvent>(32);

    let telemetry = JsonlTelemetry::new(&config.telemetry_path);
    let mut engine = PolicyEngine::new(
        &config,
        settings.clone(),
        telemetry,
        MonotonicClock::new(),
        decision_tx.clone(),
    );

    // Mode-change subscription: the store nudges on every write of the
    // airplane mode key; a forwarder marshals the nudge onto the
    // engine's queue, preserving serial delivery.
    if engine.is_enabled() {
        let (nudge_tx, mut nudge_rx) = mpsc::channel(8);
        settings.watch_key(keys::AIRPLANE_MODE_ON, nudge_tx);

        let mode_tx = policy_tx.clone();
        tokio::spawn(async move {
            while nudge_rx.recv().await.is_some() {
                if mode_tx.send(PolicyEvent::ModeSettingChanged).await.is_err() {
                    break;
                }
            }
        });
    }

    // Wire the radio stack; transitions before this point are ignored
    let bridge = RadioBridge::new(settings.clone());
    engine.start(bridge.clone());

    let server = Server::new(
        &config.socket_path,
        ServerCtx {
            settings: settings.clone(),
            bridge,
            policy_tx: policy_tx.clone(),
            decisions: decision_tx.clone(),
            policy_active: engine.is_enabled(),
        },
    )?;

    let shutdown = ShutdownSignal::new();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the policy engine (drains the dispatch queue)
        _ = engine.run(policy_rx) => {
            info!("policy engine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    server.shutdown().await;

    info!("radio-policyd stopped");

    Ok(())
}
