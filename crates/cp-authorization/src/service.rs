//! Charge point service: the machine's event loop and its handles.
//!
//! One machine instance owns:
//! - a single ordered event queue (external triggers and internal events)
//! - the pending-call index, shared with its listener
//! - the listener task bound to the connection
//!
//! Both tasks are scoped to the [`ChargePoint`]; dropping it tears them down.

use crate::domain::codec::Call;
use crate::domain::config::ChargePointConfig;
use crate::domain::error::{ConfigError, MachineError};
use crate::domain::machine::{transition, AuthEvent, AuthState, Effect, InternalEvent, Transition};
use crate::domain::message_id::MessageId;
use crate::domain::pending::PendingCallIndex;
use crate::domain::schema::{ActionName, SchemaRegistry};
use crate::listener::{ConnectionListener, FrameDispatcher, ListenerStats};
use crate::ports::{DuplexConnection, FrameSink};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

/// Counters for the event loop
#[derive(Debug, Default)]
pub struct MachineStats {
    /// Events that changed state
    pub transitions: AtomicU64,
    /// Events with no transition from the current state
    pub ignored_events: AtomicU64,
    /// Calls that could not be written to the connection
    pub send_failures: AtomicU64,
}

impl MachineStats {
    /// Events fully processed by the loop.
    pub fn events_processed(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
            + self.ignored_events.load(Ordering::Relaxed)
            + self.send_failures.load(Ordering::Relaxed)
    }
}

/// Presentation-layer handle: read the state, swipe a card.
#[derive(Clone)]
pub struct ChargePointHandle {
    events: mpsc::Sender<AuthEvent>,
    state: watch::Receiver<AuthState>,
}

impl ChargePointHandle {
    /// Queue a `swipe_card` event with a freshly minted message id.
    ///
    /// Ignored by the machine unless it is `unauthorized`.
    pub async fn swipe_card(&self, id_tag: impl Into<String>) -> Result<MessageId, MachineError> {
        let message_id = MessageId::generate();
        self.events
            .send(AuthEvent::SwipeCard {
                id_tag: id_tag.into(),
                message_id: message_id.clone(),
            })
            .await
            .map_err(|_| MachineError::QueueClosed)?;
        Ok(message_id)
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn state_name(&self) -> &'static str {
        self.state().name()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Stream of states, starting with the current one.
    pub fn state_changes(&self) -> WatchStream<AuthState> {
        WatchStream::new(self.state.clone())
    }

    /// Wait until the machine reaches `target`.
    pub async fn wait_for_state(&self, target: AuthState) -> Result<(), MachineError> {
        let mut rx = self.state.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| MachineError::QueueClosed)
    }
}

/// Sender for internal events only.
///
/// Held by the listener. Also the extension point for composing a timeout
/// externally (inject `AuthorizationFail` after a deadline).
#[derive(Clone)]
pub struct InternalEventSender(pub(crate) mpsc::Sender<AuthEvent>);

impl InternalEventSender {
    pub async fn send(&self, event: InternalEvent) -> Result<(), MachineError> {
        self.0
            .send(event.into())
            .await
            .map_err(|_| MachineError::QueueClosed)
    }
}

/// Single consumer of the event queue. Applies one event at a time.
struct MachineRunner {
    state: AuthState,
    events: mpsc::Receiver<AuthEvent>,
    state_tx: watch::Sender<AuthState>,
    pending: Arc<PendingCallIndex>,
    sink: Arc<dyn FrameSink>,
    stats: Arc<MachineStats>,
}

impl MachineRunner {
    async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.apply(event).await;
        }
        debug!(state = %self.state, "Event queue closed, machine stopped");
    }

    async fn apply(&mut self, event: AuthEvent) {
        let Transition::Next { state: next, effects } = transition(self.state, &event) else {
            self.stats.ignored_events.fetch_add(1, Ordering::Relaxed);
            debug!(state = %self.state, event = event.name(), "Ignoring event");
            return;
        };

        // Effects complete before the transition is published
        for effect in effects {
            self.execute(effect).await;
        }

        info!(from = %self.state, to = %next, event = event.name(), "State transition");
        self.state = next;
        self.state_tx.send_replace(next);
        self.stats.transitions.fetch_add(1, Ordering::Relaxed);
    }

    async fn execute(&self, effect: Effect) {
        match effect {
            Effect::Authorize { id_tag, message_id } => {
                let call = Call::new(message_id, ActionName::AUTHORIZE, json!({ "idTag": id_tag }));

                // Recorded before sending so even an immediate response resolves
                self.pending.record(call.message_id.clone(), call.action);
                match self.sink.send(call.encode()).await {
                    Ok(()) => {
                        debug!(message_id = %call.message_id, action = %call.action, "Sent call");
                    }
                    // The entry stays pending; only a response or a dropped machine removes it
                    Err(e) => {
                        self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            message_id = %call.message_id,
                            action = %call.action,
                            error = %e,
                            "Failed to send call"
                        );
                    }
                }
            }
        }
    }
}

/// A running authorization machine bound to one connection.
pub struct ChargePoint {
    handle: ChargePointHandle,
    internal: InternalEventSender,
    pending: Arc<PendingCallIndex>,
    machine_stats: Arc<MachineStats>,
    listener_stats: Arc<ListenerStats>,
    machine_task: Option<JoinHandle<()>>,
    listener_task: Option<JoinHandle<()>>,
}

impl ChargePoint {
    /// Adopt an open connection and start the machine and its listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        connection: DuplexConnection,
        config: &ChargePointConfig,
    ) -> Result<Self, ConfigError> {
        Self::start_with_schemas(connection, config, SchemaRegistry::shared())
    }

    /// Like [`ChargePoint::start`], with a caller-supplied schema registry.
    pub fn start_with_schemas(
        connection: DuplexConnection,
        config: &ChargePointConfig,
        schemas: Arc<SchemaRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let DuplexConnection { sink, source } = connection;
        let pending = Arc::new(PendingCallIndex::new());
        let machine_stats = Arc::new(MachineStats::default());
        let (events_tx, events_rx) = mpsc::channel(config.machine.event_queue_capacity);
        let (state_tx, state_rx) = watch::channel(AuthState::default());

        let runner = MachineRunner {
            state: AuthState::default(),
            events: events_rx,
            state_tx,
            pending: Arc::clone(&pending),
            sink,
            stats: Arc::clone(&machine_stats),
        };

        let internal = InternalEventSender(events_tx.clone());
        let dispatcher =
            FrameDispatcher::new(Arc::clone(&pending), schemas, config.limits.max_frame_size);
        let listener_stats = dispatcher.stats();
        let listener = ConnectionListener::new(source, dispatcher, internal.clone());

        let machine_task = tokio::spawn(runner.run());
        let listener_task = tokio::spawn(listener.run());

        info!(
            queue_capacity = config.machine.event_queue_capacity,
            max_frame_size = config.limits.max_frame_size,
            "Charge point machine started"
        );

        Ok(Self {
            handle: ChargePointHandle {
                events: events_tx,
                state: state_rx,
            },
            internal,
            pending,
            machine_stats,
            listener_stats,
            machine_task: Some(machine_task),
            listener_task: Some(listener_task),
        })
    }

    /// Handle for the presentation layer.
    pub fn handle(&self) -> ChargePointHandle {
        self.handle.clone()
    }

    /// Sender for synthetic internal events (e.g. an external timeout).
    pub fn internal_events(&self) -> InternalEventSender {
        self.internal.clone()
    }

    pub fn state(&self) -> AuthState {
        self.handle.state()
    }

    pub fn pending(&self) -> &PendingCallIndex {
        &self.pending
    }

    pub fn machine_stats(&self) -> &MachineStats {
        &self.machine_stats
    }

    pub fn listener_stats(&self) -> &ListenerStats {
        &self.listener_stats
    }

    /// Whether the listener is still attached to the connection.
    pub fn is_listening(&self) -> bool {
        self.listener_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the listener and the machine and wait for both to finish.
    pub async fn shutdown(mut self) {
        for task in [self.listener_task.take(), self.machine_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "Charge point task panicked");
                }
            }
        }
        info!("Charge point machine stopped");
    }
}

impl Drop for ChargePoint {
    fn drop(&mut self) {
        for task in [self.listener_task.take(), self.machine_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::channel::connection_pair;
    use crate::domain::error::ConnectionError;
    use crate::ports::FrameSource;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingSink;

    #[async_trait]
    impl FrameSink for FailingSink {
        async fn send(&self, _frame: String) -> Result<(), ConnectionError> {
            Err(ConnectionError::Send("broken pipe".into()))
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl FrameSource for BrokenSource {
        async fn receive(&mut self) -> Result<String, ConnectionError> {
            Err(ConnectionError::Receive("connection reset".into()))
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_starts_unauthorized() {
        let (connection, _remote) = connection_pair(8);
        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        assert_eq!(cp.state(), AuthState::Unauthorized);
        assert_eq!(cp.handle().state_name(), "unauthorized");
        assert!(cp.is_listening());
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let (connection, _remote) = connection_pair(8);
        let mut config = ChargePointConfig::default();
        config.machine.event_queue_capacity = 0;
        assert!(ChargePoint::start(connection, &config).is_err());
    }

    #[tokio::test]
    async fn test_swipe_sends_authorize_call() {
        let (connection, mut remote) = connection_pair(8);
        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        let handle = cp.handle();

        let message_id = handle.swipe_card("ABC").await.unwrap();
        handle.wait_for_state(AuthState::Authorizing).await.unwrap();

        let frame: serde_json::Value =
            serde_json::from_str(&remote.next_frame().await.unwrap()).unwrap();
        assert_eq!(
            frame,
            json!([2, message_id.as_str(), "Authorize", { "idTag": "ABC" }])
        );
        assert!(cp.pending().is_pending(&message_id));
    }

    #[tokio::test]
    async fn test_send_failure_still_enters_authorizing() {
        let (channel, _remote) = connection_pair(8);
        let connection = DuplexConnection::new(Arc::new(FailingSink), channel.source);

        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        let message_id = cp.handle().swipe_card("ABC").await.unwrap();

        cp.handle()
            .wait_for_state(AuthState::Authorizing)
            .await
            .unwrap();
        assert_eq!(cp.machine_stats().send_failures.load(Ordering::Relaxed), 1);
        // Removed only by a matching response
        assert!(cp.pending().is_pending(&message_id));
        assert_eq!(cp.pending().pending_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_source_does_not_starve_machine() {
        let (channel, mut remote) = connection_pair(8);
        let connection = DuplexConnection::new(channel.sink, Box::new(BrokenSource));

        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        let handle = cp.handle();
        handle.swipe_card("ABC").await.unwrap();

        tokio::time::timeout(
            Duration::from_secs(2),
            handle.wait_for_state(AuthState::Authorizing),
        )
        .await
        .expect("machine starved by listener")
        .unwrap();
        assert!(remote.next_frame().await.is_some());
        wait_until(|| !cp.is_listening()).await;
    }

    #[tokio::test]
    async fn test_shutdown_after_machine_panic() {
        let (connection, _remote) = connection_pair(8);
        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        let handle = cp.handle();

        // A swipe reusing a pending id trips the duplicate-record assertion
        let message_id = MessageId::new("reused");
        cp.pending.record(message_id.clone(), ActionName::AUTHORIZE);
        handle
            .events
            .send(AuthEvent::SwipeCard {
                id_tag: "ABC".into(),
                message_id,
            })
            .await
            .unwrap();

        wait_until(|| {
            cp.machine_task
                .as_ref()
                .is_some_and(|task| task.is_finished())
        })
        .await;
        tokio::time::timeout(Duration::from_secs(2), cp.shutdown())
            .await
            .expect("shutdown hung after panic");
        assert_eq!(handle.state(), AuthState::Unauthorized);
        assert_eq!(
            handle.swipe_card("ABC").await,
            Err(MachineError::QueueClosed)
        );
    }

    #[tokio::test]
    async fn test_internal_sender_drives_timeout() {
        let (connection, _remote) = connection_pair(8);
        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        let handle = cp.handle();

        handle.swipe_card("ABC").await.unwrap();
        handle.wait_for_state(AuthState::Authorizing).await.unwrap();

        // No response ever arrives; an external deadline injects the failure
        cp.internal_events()
            .send(InternalEvent::AuthorizationFail)
            .await
            .unwrap();
        handle.wait_for_state(AuthState::Unauthorized).await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_stops_when_connection_closes() {
        let (connection, remote) = connection_pair(8);
        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();

        remote.close();
        wait_until(|| !cp.is_listening()).await;
        assert_eq!(cp.state(), AuthState::Unauthorized);
    }

    #[tokio::test]
    async fn test_shutdown_closes_queue() {
        let (connection, _remote) = connection_pair(8);
        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        let handle = cp.handle();

        cp.shutdown().await;
        assert_eq!(
            handle.swipe_card("ABC").await,
            Err(MachineError::QueueClosed)
        );
    }

    #[tokio::test]
    async fn test_drop_tears_down_tasks() {
        let (connection, _remote) = connection_pair(8);
        let cp = ChargePoint::start(connection, &ChargePointConfig::default()).unwrap();
        let handle = cp.handle();

        drop(cp);
        let mut rx = handle.subscribe();
        // Sender side is dropped with the aborted machine task
        tokio::time::timeout(Duration::from_secs(2), async {
            while rx.changed().await.is_ok() {}
        })
        .await
        .unwrap();
        assert!(handle.swipe_card("ABC").await.is_err());
    }
}
