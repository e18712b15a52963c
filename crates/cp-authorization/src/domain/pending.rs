//! Pending-call index: the correlator between sent calls and their responses.
//!
//! Flow:
//! 1. The `authorize` transition action mints a `MessageId`
//! 2. It calls `record()` and only then transmits the call
//! 3. The listener decodes a response and calls `resolve()`
//! 4. `resolve()` removes the entry, so each id resolves at most once
//!
//! The index is owned by one machine instance and shared by reference with
//! its listener. Removal is a single atomic `remove` on the map, which keeps
//! `resolve` exactly-once under concurrent frame arrival. An entry whose
//! response never arrives stays until the machine is dropped.
//!
//! Outside this crate the index is read-only:
//!
//! ```compile_fail
//! use cp_authorization::domain::{MessageId, PendingCallIndex};
//!
//! let index = PendingCallIndex::new();
//! index.resolve(&MessageId::new("m-1"));
//! ```
//!
//! ```compile_fail
//! use cp_authorization::domain::{ActionName, MessageId, PendingCallIndex};
//!
//! let index = PendingCallIndex::new();
//! index.record(MessageId::new("m-1"), ActionName::AUTHORIZE);
//! ```

use crate::domain::message_id::MessageId;
use crate::domain::schema::ActionName;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// An in-flight call
#[derive(Debug)]
struct PendingCall {
    action: ActionName,
    /// When the call was recorded
    recorded_at: Instant,
}

/// Counters for the pending-call index
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Total calls recorded
    pub total_recorded: AtomicU64,
    /// Total responses matched to a pending call
    pub total_resolved: AtomicU64,
    /// Total lookups for ids that were never or are no longer pending
    pub total_unknown: AtomicU64,
}

/// Mapping from in-flight message id to the action that was sent.
#[derive(Debug, Default)]
pub struct PendingCallIndex {
    pending: DashMap<MessageId, PendingCall>,
    stats: CorrelatorStats,
}

impl PendingCallIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call that is about to be sent.
    ///
    /// # Panics
    ///
    /// Panics if `message_id` is already pending. Ids are minted fresh for
    /// every call, so a duplicate means the caller's id generation is broken.
    pub(crate) fn record(&self, message_id: MessageId, action: ActionName) {
        match self.pending.entry(message_id) {
            Entry::Occupied(entry) => {
                panic!(
                    "message id {} recorded twice (pending action {})",
                    entry.key(),
                    entry.get().action
                );
            }
            Entry::Vacant(entry) => {
                debug!(message_id = %entry.key(), action = %action, "Recorded pending call");
                entry.insert(PendingCall {
                    action,
                    recorded_at: Instant::now(),
                });
            }
        }
        self.stats.total_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Look up and remove the action for `message_id`.
    ///
    /// Returns `None` for ids that were never recorded or were already resolved.
    pub(crate) fn resolve(&self, message_id: &MessageId) -> Option<ActionName> {
        match self.pending.remove(message_id) {
            Some((_, call)) => {
                self.stats.total_resolved.fetch_add(1, Ordering::Relaxed);
                debug!(
                    message_id = %message_id,
                    action = %call.action,
                    response_time_ms = call.recorded_at.elapsed().as_millis(),
                    "Resolved pending call"
                );
                Some(call.action)
            }
            None => {
                self.stats.total_unknown.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn is_pending(&self, message_id: &MessageId) -> bool {
        self.pending.contains_key(message_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_resolve() {
        let index = PendingCallIndex::new();
        let id = MessageId::generate();

        index.record(id.clone(), ActionName::AUTHORIZE);
        assert!(index.is_pending(&id));
        assert_eq!(index.pending_count(), 1);

        assert_eq!(index.resolve(&id), Some(ActionName::AUTHORIZE));
        assert!(!index.is_pending(&id));
        assert_eq!(index.pending_count(), 0);
    }

    #[test]
    fn test_second_resolve_is_not_found() {
        let index = PendingCallIndex::new();
        let id = MessageId::new("m-1");
        index.record(id.clone(), ActionName::AUTHORIZE);

        assert!(index.resolve(&id).is_some());
        assert!(index.resolve(&id).is_none());
    }

    #[test]
    fn test_resolve_unknown_id() {
        let index = PendingCallIndex::new();
        assert!(index.resolve(&MessageId::new("never-sent")).is_none());
        assert_eq!(index.stats().total_unknown.load(Ordering::Relaxed), 1);
    }

    #[test]
    #[should_panic(expected = "recorded twice")]
    fn test_duplicate_record_panics() {
        let index = PendingCallIndex::new();
        let id = MessageId::new("dup");
        index.record(id.clone(), ActionName::AUTHORIZE);
        index.record(id, ActionName::AUTHORIZE);
    }

    #[test]
    fn test_stats() {
        let index = PendingCallIndex::new();
        let id1 = MessageId::generate();
        let id2 = MessageId::generate();
        index.record(id1.clone(), ActionName::AUTHORIZE);
        index.record(id2.clone(), ActionName::AUTHORIZE);

        index.resolve(&id1);
        index.resolve(&id1);

        let stats = index.stats();
        assert_eq!(stats.total_recorded.load(Ordering::Relaxed), 2);
        assert_eq!(stats.total_resolved.load(Ordering::Relaxed), 1);
        assert_eq!(stats.total_unknown.load(Ordering::Relaxed), 1);
        // Never answered, still pending
        assert!(index.is_pending(&id2));
    }

    #[test]
    fn test_concurrent_resolve_is_exactly_once() {
        let index = Arc::new(PendingCallIndex::new());
        let id = MessageId::generate();
        index.record(id.clone(), ActionName::AUTHORIZE);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = Arc::clone(&index);
                let id = id.clone();
                std::thread::spawn(move || index.resolve(&id).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|resolved| *resolved)
            .count();
        assert_eq!(winners, 1);
    }

    proptest! {
        #[test]
        fn prop_each_recorded_id_resolves_once(ids in proptest::collection::hash_set("[a-z0-9-]{1,36}", 1..32)) {
            let index = PendingCallIndex::new();
            for id in &ids {
                index.record(MessageId::new(id.clone()), ActionName::AUTHORIZE);
            }
            for id in &ids {
                let id = MessageId::new(id.clone());
                prop_assert_eq!(index.resolve(&id), Some(ActionName::AUTHORIZE));
                prop_assert_eq!(index.resolve(&id), None);
            }
            prop_assert_eq!(index.pending_count(), 0);
        }
    }
}
