//! Domain layer: pure logic, no I/O.
//!
//! Async infrastructure (event queue, listener task) lives in `service` and
//! `listener`; connection implementations live in `adapters`.

pub mod codec;
pub mod config;
pub mod error;
pub mod machine;
pub mod message_id;
pub mod pending;
pub mod schema;

// Re-exports for convenience
pub use codec::{decode_frame, decode_frame_bounded, encode_call, Call, IncomingFrame};
pub use config::{ChargePointConfig, ConnectionConfig, LimitsConfig, MachineConfig};
pub use error::{ConfigError, ConnectionError, DecodeError, MachineError, ValidationError};
pub use machine::{transition, AuthEvent, AuthState, Effect, InternalEvent, Transition};
pub use message_id::MessageId;
pub use pending::{CorrelatorStats, PendingCallIndex};
pub use schema::{
    ActionName, ActionSchema, AuthorizationStatus, AuthorizeConf, IdTagInfo, ParsedResponse,
    SchemaRegistry,
};
