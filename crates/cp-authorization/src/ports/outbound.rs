//! Outbound ports: the already-open duplex connection handed to the machine.

use crate::domain::error::ConnectionError;
use async_trait::async_trait;
use std::sync::Arc;

/// Write half of the connection. One call = one text message on the wire.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: String) -> Result<(), ConnectionError>;
}

/// Read half of the connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the next text message (waits until one is available).
    ///
    /// Returns `ConnectionError::Closed` once the peer has gone away.
    async fn receive(&mut self) -> Result<String, ConnectionError>;
}

/// A ready-to-send connection, split into its two halves.
pub struct DuplexConnection {
    pub sink: Arc<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

impl DuplexConnection {
    pub fn new(sink: Arc<dyn FrameSink>, source: Box<dyn FrameSource>) -> Self {
        Self { sink, source }
    }
}
