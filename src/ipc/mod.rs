//! IPC surface of the daemon
//!
//! The settings UI and the radio stack talk to the policy engine over a
//! Unix domain socket with length-prefixed JSON messages.

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::{Server, ServerCtx};
