//! Airplane mode transition decision core
//!
//! Handles the airplane mode change callback, runs the keep-alive
//! decision table, persists the user's override history, and emits one
//! telemetry snapshot per session.
//!
//! All engine state lives on one dispatch task; callers marshal their
//! events onto that task's queue (see [`PolicyEvent`]). The engine does
//! no locking of its own.

use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::{Config, RADIO_BLUETOOTH};
use crate::connectivity::{ConnectivityController, NotificationKind};
use crate::events::{DecisionEvent, PolicyEvent};
use crate::settings::{keys, ApmDesiredState, RadioPowerSetting, SettingsStore};
use crate::telemetry::{ApmSessionReport, TelemetrySink};

use super::throttle::NotificationThrottle;

/// Window after entering airplane mode in which a first user toggle
/// counts as "immediate"
pub const ONE_MINUTE_MS: u64 = 60_000;

/// Millisecond time source, injectable for tests.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Milliseconds elapsed since process start
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Per-session and cached state, mutated only on the dispatch task.
#[derive(Debug, Default)]
struct PolicyState {
    /// Last known device-wide mode; dedups redundant callbacks
    airplane_mode_on: bool,
    /// Radio power captured when airplane mode turned on
    bluetooth_on_before_toggle: bool,
    /// Whether policy chose to keep the radio up
    bluetooth_on_after_toggle: bool,
    /// Media profile state captured when airplane mode turned on
    media_connected_before_toggle: bool,
    /// User changed radio power at some point this session
    user_toggled_during_apm: bool,
    /// That first toggle landed within a minute of entering; set once
    /// per session, never recomputed by later toggles
    user_toggled_within_minute: bool,
    /// When airplane mode last turned on
    apm_enabled_at_millis: u64,
}

/// The radio-mode transition policy engine.
///
/// Collaborators are injected: the settings store and telemetry sink at
/// construction, the radio stack via [`PolicyEngine::start`]. Until
/// `start` runs, every transition is a silent no-op (boot-ordering
/// guard). If the platform does not subject Bluetooth to airplane mode
/// at all, the engine disables itself permanently at construction.
pub struct PolicyEngine<S, C, T, K> {
    settings: S,
    telemetry: T,
    clock: K,
    connectivity: Option<C>,
    throttle: NotificationThrottle,
    event_tx: broadcast::Sender<DecisionEvent>,
    state: PolicyState,
    enabled: bool,
}

impl<S, C, T, K> PolicyEngine<S, C, T, K>
where
    S: SettingsStore,
    C: ConnectivityController + Clone,
    T: TelemetrySink,
    K: Clock,
{
    pub fn new(
        config: &Config,
        settings: S,
        telemetry: T,
        clock: K,
        event_tx: broadcast::Sender<DecisionEvent>,
    ) -> Self {
        let enabled = config.radio_included(RADIO_BLUETOOTH);
        if !enabled {
            warn!("bluetooth not subject to airplane mode, policy engine disabled");
        }

        // Seed the cache from the authoritative flag exactly once
        let airplane_mode_on = enabled && settings.global_int(keys::AIRPLANE_MODE_ON, 0) == 1;

        Self {
            settings,
            telemetry,
            clock,
            connectivity: None,
            throttle: NotificationThrottle::new(),
            event_tx,
            state: PolicyState {
                airplane_mode_on,
                ..PolicyState::default()
            },
            enabled,
        }
    }

    /// Wire the radio stack and load persisted counters. Called once
    /// the rest of the system has booted; transitions before this are
    /// ignored.
    pub fn start(&mut self, connectivity: C) {
        info!("policy engine start");
        self.throttle.load(&self.settings);
        self.connectivity = Some(connectivity);
    }

    /// Whether Bluetooth is subject to airplane mode on this platform
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Last known airplane mode value
    pub fn airplane_mode_on(&self) -> bool {
        self.state.airplane_mode_on
    }

    /// Drain the dispatch queue. This is the only task that touches
    /// engine state.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<PolicyEvent>) {
        info!("policy engine started");

        while let Some(event) = rx.recv().await {
            match event {
                PolicyEvent::ModeSettingChanged => self.on_mode_changed(),
                PolicyEvent::UserToggledRadio { turned_on } => self.notify_user_toggle(turned_on),
            }
        }

        info!("policy engine stopped");
    }

    /// Airplane mode change callback.
    ///
    /// Carries no payload: the authoritative flag is re-read here and
    /// compared against the cache, so duplicate deliveries of the same
    /// value collapse to nothing.
    pub fn on_mode_changed(&mut self) {
        if !self.enabled {
            return;
        }

        let airplane_mode_on = self.settings.global_int(keys::AIRPLANE_MODE_ON, 0) == 1;
        if self.state.airplane_mode_on == airplane_mode_on {
            debug!(airplane_mode_on, "ignoring duplicate airplane mode notification");
            return;
        }

        self.state.airplane_mode_on = airplane_mode_on;
        self.handle_transition(airplane_mode_on);
    }

    fn handle_transition(&mut self, turning_on: bool) {
        let Some(connectivity) = self.connectivity.clone() else {
            debug!(turning_on, "transition before start, ignoring");
            return;
        };

        if turning_on {
            self.state.apm_enabled_at_millis = self.clock.now_millis();
            self.state.bluetooth_on_before_toggle = connectivity.is_radio_on();
            self.state.media_connected_before_toggle = connectivity.is_media_connected();
            self.state.bluetooth_on_after_toggle =
                self.should_keep_on(self.state.media_connected_before_toggle);

            if self.state.bluetooth_on_after_toggle {
                info!(
                    media_connected = self.state.media_connected_before_toggle,
                    "keeping radio on through airplane mode"
                );
                // The radio survives: record the sentinel, not plain
                // "on", and do NOT propagate the mode change downward.
                self.settings.set_global_int(
                    keys::BLUETOOTH_ON,
                    RadioPowerSetting::OnForAirplaneMode.as_int(),
                );
                self.display_notification_if_needed(&connectivity);
                let _ = self.event_tx.send(DecisionEvent::RadioKeptOn {
                    media_connected: self.state.media_connected_before_toggle,
                });
                return;
            }
        } else {
            // One atomic snapshot; nothing here may read a field after
            // the session flags below are reset.
            let report = ApmSessionReport {
                bluetooth_on_before_toggle: self.state.bluetooth_on_before_toggle,
                bluetooth_on_after_toggle: self.state.bluetooth_on_after_toggle,
                bluetooth_on_now: connectivity.is_radio_on(),
                user_toggled_ever: self.user_has_ever_toggled(),
                user_toggled_during_apm: self.state.user_toggled_during_apm,
                user_toggled_within_minute: self.state.user_toggled_within_minute,
                media_connected_before_toggle: self.state.media_connected_before_toggle,
            };
            self.telemetry.report_session(&report);
            let _ = self.event_tx.send(DecisionEvent::SessionReported { report });

            // Session-scoped flags expire with the session
            self.state.user_toggled_during_apm = false;
            self.state.user_toggled_within_minute = false;
        }

        connectivity.propagate_mode_change(turning_on);
        let _ = self.event_tx.send(DecisionEvent::ModeChangePropagated {
            airplane_mode_on: turning_on,
        });
    }

    /// The keep-alive decision table, first match wins.
    fn should_keep_on(&self, media_connected: bool) -> bool {
        let enhancement = self.enhancement_enabled();
        let ever_toggled = self.user_has_ever_toggled();
        let bt_on = self.state.bluetooth_on_before_toggle;

        // Feature off and never used: only an active audio session
        // justifies keeping the radio up.
        if !enhancement && !ever_toggled {
            return bt_on && media_connected;
        }
        // Feature on and the user has expressed a preference: follow it.
        if enhancement && ever_toggled {
            return bt_on && self.desired_apm_state() == ApmDesiredState::On;
        }
        // Feature on, no toggle history yet: the persisted default still
        // decides, so this arm stays separate from the one above.
        if enhancement && !ever_toggled {
            return bt_on && self.desired_apm_state() == ApmDesiredState::On;
        }
        false
    }

    fn display_notification_if_needed(&mut self, connectivity: &C) {
        if !self.enhancement_enabled() || !self.user_has_ever_toggled() {
            // Passive toast, throttled over the device lifetime
            if self.throttle.try_pop(&self.settings) {
                self.request_notification(connectivity, NotificationKind::ApmToast);
            }
            return;
        }

        // Enhancement users get a full notification, never throttled
        if self.wifi_kept_on_in_apm() {
            self.request_notification(connectivity, NotificationKind::WifiAndRadioKeptOn);
        } else {
            self.request_notification(connectivity, NotificationKind::RadioKeptOn);
        }
    }

    /// The user manually changed radio power.
    ///
    /// Meaningless outside an airplane mode session; such events are
    /// discarded.
    pub fn notify_user_toggle(&mut self, turned_on: bool) {
        if !self.state.airplane_mode_on {
            debug!(turned_on, "radio toggle outside airplane mode, discarding");
            return;
        }

        if !self.state.user_toggled_during_apm {
            let elapsed = self
                .clock
                .now_millis()
                .saturating_sub(self.state.apm_enabled_at_millis);
            self.state.user_toggled_within_minute = elapsed < ONE_MINUTE_MS;
        }
        self.state.user_toggled_during_apm = true;

        if self.enhancement_enabled() {
            let desired = if turned_on {
                ApmDesiredState::On
            } else {
                ApmDesiredState::Off
            };
            self.settings
                .set_secure_int(keys::BLUETOOTH_APM_STATE, desired.as_int());
            self.settings
                .set_secure_int(keys::APM_USER_TOGGLED_BLUETOOTH, keys::USED);

            if turned_on {
                if let Some(connectivity) = self.connectivity.clone() {
                    self.request_notification(&connectivity, NotificationKind::RadioEnabled);
                }
            }
        }
    }

    fn request_notification(&self, connectivity: &C, kind: NotificationKind) {
        connectivity.send_notification(kind);
        let _ = self
            .event_tx
            .send(DecisionEvent::NotificationRequested { kind });
    }

    fn enhancement_enabled(&self) -> bool {
        self.settings.global_int(keys::APM_ENHANCEMENT, 0) == 1
    }

    fn user_has_ever_toggled(&self) -> bool {
        self.settings
            .secure_int(keys::APM_USER_TOGGLED_BLUETOOTH, keys::UNUSED)
            == keys::USED
    }

    fn desired_apm_state(&self) -> ApmDesiredState {
        ApmDesiredState::from_int(self.settings.secure_int(keys::BLUETOOTH_APM_STATE, 0))
    }

    fn wifi_kept_on_in_apm(&self) -> bool {
        self.settings.global_int(keys::WIFI_ON, 0) != 0
            && self.settings.secure_int(keys::WIFI_APM_STATE, 0) == 1
    }
}
