//! Authorization state machine.
//!
//! ```text
//!                  swipe_card / authorize
//!  ┌──────────────┐ ─────────────────────► ┌──────────────┐  authorization_success  ┌────────────┐
//!  │ unauthorized │                        │ authorizing  │ ──────────────────────► │ authorized │
//!  └──────────────┘ ◄───────────────────── └──────────────┘                         └────────────┘
//!                     authorization_fail
//! ```
//!
//! `transition` is pure: it returns the next state and the side effects the
//! runner must execute before the new state is published. Any event not in
//! the table is ignored and leaves the state unchanged.

use crate::domain::message_id::MessageId;
use crate::domain::schema::{AuthorizationStatus, ParsedResponse};
use std::fmt;

/// Authorization workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthState {
    #[default]
    Unauthorized,
    Authorizing,
    /// Terminal for this workflow instance.
    Authorized,
}

impl AuthState {
    /// Display string exposed to the presentation layer.
    pub const fn name(&self) -> &'static str {
        match self {
            AuthState::Unauthorized => "unauthorized",
            AuthState::Authorizing => "authorizing",
            AuthState::Authorized => "authorized",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events synthesized by the listener from a validated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalEvent {
    AuthorizationSuccess,
    AuthorizationFail,
}

/// Everything the machine's event queue can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// External trigger from the presentation layer.
    SwipeCard {
        id_tag: String,
        message_id: MessageId,
    },
    Internal(InternalEvent),
}

impl AuthEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            AuthEvent::SwipeCard { .. } => "swipe_card",
            AuthEvent::Internal(InternalEvent::AuthorizationSuccess) => "authorization_success",
            AuthEvent::Internal(InternalEvent::AuthorizationFail) => "authorization_fail",
        }
    }
}

impl From<InternalEvent> for AuthEvent {
    fn from(event: InternalEvent) -> Self {
        AuthEvent::Internal(event)
    }
}

/// Side effect attached to a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Record `message_id` as a pending Authorize call and transmit it.
    Authorize {
        id_tag: String,
        message_id: MessageId,
    },
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next { state: AuthState, effects: Vec<Effect> },
    Ignored,
}

/// Apply `event` to `state`.
pub fn transition(state: AuthState, event: &AuthEvent) -> Transition {
    match (state, event) {
        (AuthState::Unauthorized, AuthEvent::SwipeCard { id_tag, message_id }) => {
            Transition::Next {
                state: AuthState::Authorizing,
                effects: vec![Effect::Authorize {
                    id_tag: id_tag.clone(),
                    message_id: message_id.clone(),
                }],
            }
        }
        (AuthState::Authorizing, AuthEvent::Internal(InternalEvent::AuthorizationSuccess)) => {
            Transition::Next {
                state: AuthState::Authorized,
                effects: Vec::new(),
            }
        }
        (AuthState::Authorizing, AuthEvent::Internal(InternalEvent::AuthorizationFail)) => {
            Transition::Next {
                state: AuthState::Unauthorized,
                effects: Vec::new(),
            }
        }
        _ => Transition::Ignored,
    }
}

/// Status to event mapping. Exactly one status grants authorization.
pub const AUTHORIZATION_OUTCOMES: [(AuthorizationStatus, InternalEvent); 4] = [
    (AuthorizationStatus::Accepted, InternalEvent::AuthorizationSuccess),
    (AuthorizationStatus::Blocked, InternalEvent::AuthorizationFail),
    (AuthorizationStatus::Expired, InternalEvent::AuthorizationFail),
    (AuthorizationStatus::Invalid, InternalEvent::AuthorizationFail),
];

/// Look up the event for an authorization status. Fails closed.
pub fn authorization_outcome(status: AuthorizationStatus) -> InternalEvent {
    AUTHORIZATION_OUTCOMES
        .iter()
        .find(|(s, _)| *s == status)
        .map(|(_, event)| *event)
        .unwrap_or(InternalEvent::AuthorizationFail)
}

/// Derive the internal event for a validated response.
pub fn response_outcome(response: &ParsedResponse) -> InternalEvent {
    match response {
        ParsedResponse::Authorize(conf) => authorization_outcome(conf.id_tag_info.status),
    }
}
