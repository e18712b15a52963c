//! Charge point authorization - call correlation and the authorization workflow.
//!
//! A charge point sends `Authorize` calls to its central system over one
//! persistent duplex connection and drives a small state machine from the
//! validated responses.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          CHARGE POINT                                │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  presentation ── swipe_card ──┐                                      │
//! │                               ▼                                      │
//! │                  ┌────────────────────────┐                          │
//! │                  │  ordered event queue   │◄──── internal events ─┐  │
//! │                  └───────────┬────────────┘                       │  │
//! │                              ▼                                    │  │
//! │                  ┌────────────────────────┐                       │  │
//! │                  │     state machine      │                       │  │
//! │                  │  (authorize action)    │                       │  │
//! │                  └───┬──────────────┬─────┘                       │  │
//! │           record(id) │              │ encode + send               │  │
//! │                      ▼              ▼                             │  │
//! │           ┌──────────────────┐   connection ──► listener ─────────┘  │
//! │           │ pending-call idx │◄── resolve(id) ── decode, validate    │
//! │           └──────────────────┘                                       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cp_authorization::{ChargePoint, ChargePointConfig};
//! use cp_authorization::adapters::websocket_connection;
//!
//! let config = ChargePointConfig::from_env();
//! let charge_point = ChargePoint::start(websocket_connection(ws_stream), &config)?;
//!
//! let handle = charge_point.handle();
//! handle.swipe_card("ABC").await?;
//! println!("{}", handle.state_name());
//! ```
//!
//! # Failure behavior
//!
//! Malformed frames, responses for ids this instance never sent, and
//! responses that fail their action's schema are all dropped without a
//! transition. A call with no usable response leaves the machine in
//! `authorizing`; there is no built-in timeout.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod listener;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use domain::config::ChargePointConfig;
pub use domain::error::{ConfigError, ConnectionError, DecodeError, MachineError, ValidationError};
pub use domain::machine::{AuthState, InternalEvent};
pub use domain::message_id::MessageId;
pub use domain::schema::{ActionName, AuthorizationStatus, SchemaRegistry};
pub use listener::ListenerStats;
pub use ports::{DuplexConnection, FrameSink, FrameSource};
pub use service::{ChargePoint, ChargePointHandle, InternalEventSender, MachineStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
