//! Radio-mode transition policy
//!
//! Decides, on every airplane mode transition, whether the Bluetooth
//! radio is powered down or kept running for an active audio session,
//! and which notice (if any) the user sees.

mod engine;
mod throttle;

pub use engine::{Clock, MonotonicClock, PolicyEngine, ONE_MINUTE_MS};
pub use throttle::{NotificationThrottle, MAX_TOAST_COUNT};
