//! Error types for the charge point authorization core.
//!
//! None of these reach the state machine. Decode and validation failures are
//! dropped at the listener boundary; connection failures end the listener or
//! abort the transition that tried to send.

use thiserror::Error;

/// A raw inbound frame could not be turned into an [`IncomingFrame`].
///
/// [`IncomingFrame`]: crate::domain::codec::IncomingFrame
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame is not a JSON array")]
    NotAnArray,

    #[error("frame has {len} elements, expected at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("message id is not a string")]
    MessageIdNotString,

    #[error("frame exceeds size limit: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },
}

/// A response payload does not match the schema of the action that produced it.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no schema registered for action {0}")]
    UnknownAction(String),

    #[error("payload does not match {action} schema: {source}")]
    Schema {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of the underlying duplex connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),
}

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid queue capacity: {0}")]
    InvalidCapacity(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid connection setting: {0}")]
    InvalidConnection(String),
}

/// The machine is no longer accepting events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("event queue closed")]
    QueueClosed,
}
