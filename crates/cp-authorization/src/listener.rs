//! Connection listener: turns inbound frames into internal machine events.
//!
//! Per frame, synchronously:
//!
//! ```text
//! raw ──decode──► IncomingFrame ──resolve(id)──► action ──validate──► ParsedResponse ──► InternalEvent
//!        │                              │                    │
//!        ▼                              ▼                    ▼
//!      drop                       drop (stale)         drop (fail closed)
//! ```
//!
//! The listener never touches machine state; it only pushes events onto the
//! machine's queue.

use crate::domain::codec::decode_frame_bounded;
use crate::domain::error::ConnectionError;
use crate::domain::machine::{response_outcome, InternalEvent};
use crate::domain::pending::PendingCallIndex;
use crate::domain::schema::SchemaRegistry;
use crate::ports::FrameSource;
use crate::service::InternalEventSender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counters for inbound frame handling
#[derive(Debug, Default)]
pub struct ListenerStats {
    pub frames_received: AtomicU64,
    pub decode_failures: AtomicU64,
    /// Frames whose id was not pending
    pub stale_frames: AtomicU64,
    pub validation_failures: AtomicU64,
    pub events_emitted: AtomicU64,
}

impl ListenerStats {
    /// Frames fully handled, whether they produced an event or were dropped.
    pub fn frames_handled(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
            + self.stale_frames.load(Ordering::Relaxed)
            + self.validation_failures.load(Ordering::Relaxed)
            + self.events_emitted.load(Ordering::Relaxed)
    }
}

/// Listener bound to one connection for the lifetime of one machine.
pub struct ConnectionListener {
    source: Box<dyn FrameSource>,
    dispatcher: FrameDispatcher,
    events: InternalEventSender,
}

impl ConnectionListener {
    pub fn new(
        source: Box<dyn FrameSource>,
        dispatcher: FrameDispatcher,
        events: InternalEventSender,
    ) -> Self {
        Self {
            source,
            dispatcher,
            events,
        }
    }

    /// Run the listener loop until the connection fails or the machine goes away.
    pub async fn run(mut self) {
        loop {
            match self.source.receive().await {
                Ok(raw) => {
                    let Some(event) = self.dispatcher.dispatch(&raw) else {
                        continue;
                    };
                    if self.events.send(event).await.is_err() {
                        info!("Machine event queue closed, stopping listener");
                        break;
                    }
                }
                Err(ConnectionError::Closed) => {
                    info!("Connection closed, stopping listener");
                    break;
                }
                // A source is not assumed to recover after a failed receive
                Err(e) => {
                    error!(error = %e, "Error receiving frame, stopping listener");
                    break;
                }
            }
        }
    }
}

/// The synchronous decode → resolve → validate → map pipeline.
pub struct FrameDispatcher {
    pending: Arc<PendingCallIndex>,
    schemas: Arc<SchemaRegistry>,
    max_frame_size: usize,
    stats: Arc<ListenerStats>,
}

impl FrameDispatcher {
    pub fn new(
        pending: Arc<PendingCallIndex>,
        schemas: Arc<SchemaRegistry>,
        max_frame_size: usize,
    ) -> Self {
        Self {
            pending,
            schemas,
            max_frame_size,
            stats: Arc::new(ListenerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Handle one raw frame. Returns the event to emit, if any.
    pub fn dispatch(&self, raw: &str) -> Option<InternalEvent> {
        self.stats.frames_received.fetch_add(1, Ordering::Relaxed);

        let frame = match decode_frame_bounded(raw, self.max_frame_size) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Dropping undecodable frame");
                return None;
            }
        };

        let Some(action) = self.pending.resolve(&frame.message_id) else {
            self.stats.stale_frames.fetch_add(1, Ordering::Relaxed);
            debug!(
                message_id = %frame.message_id,
                message_type = ?frame.message_type,
                "Dropping frame for unknown or already resolved message id"
            );
            return None;
        };

        let response = match self.schemas.validate(action, &frame.payload) {
            Ok(response) => response,
            Err(e) => {
                self.stats.validation_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    message_id = %frame.message_id,
                    action = %action,
                    error = %e,
                    "Dropping response that failed validation"
                );
                return None;
            }
        };

        let event = response_outcome(&response);
        self.stats.events_emitted.fetch_add(1, Ordering::Relaxed);
        debug!(
            message_id = %frame.message_id,
            action = %action,
            event = ?event,
            "Resolved response"
        );
        Some(event)
    }
}
