//! In-memory connection backed by tokio channels.
//!
//! Used by tests and by in-process central system simulators: the
//! [`RemoteEnd`] sees every frame the machine sends and can push frames back.

use crate::domain::error::ConnectionError;
use crate::ports::{DuplexConnection, FrameSink, FrameSource};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct ChannelSink(mpsc::Sender<String>);

pub struct ChannelSource(mpsc::Receiver<String>);

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: String) -> Result<(), ConnectionError> {
        self.0
            .send(frame)
            .await
            .map_err(|_| ConnectionError::Closed)
    }
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn receive(&mut self) -> Result<String, ConnectionError> {
        self.0.recv().await.ok_or(ConnectionError::Closed)
    }
}

/// The peer side of an in-memory connection.
pub struct RemoteEnd {
    /// Frames sent by the charge point
    outbound: mpsc::Receiver<String>,
    /// Frames delivered to the charge point
    inbound: mpsc::Sender<String>,
}

impl RemoteEnd {
    /// Wait for the next frame sent by the charge point.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Take a sent frame if one is already queued.
    pub fn try_next_frame(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Deliver a frame to the charge point.
    pub async fn push(&self, frame: impl Into<String>) -> Result<(), ConnectionError> {
        self.inbound
            .send(frame.into())
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Close both directions.
    pub fn close(self) {}
}

/// Create a connected pair: the charge point's connection and its peer.
pub fn connection_pair(buffer: usize) -> (DuplexConnection, RemoteEnd) {
    let (out_tx, out_rx) = mpsc::channel(buffer);
    let (in_tx, in_rx) = mpsc::channel(buffer);

    let connection = DuplexConnection::new(
        Arc::new(ChannelSink(out_tx)),
        Box::new(ChannelSource(in_rx)),
    );
    let remote = RemoteEnd {
        outbound: out_rx,
        inbound: in_tx,
    };
    (connection, remote)
}
