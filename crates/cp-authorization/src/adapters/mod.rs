//! Connection adapters implementing the outbound ports.

pub mod channel;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use channel::{connection_pair, RemoteEnd};
#[cfg(feature = "websocket")]
pub use websocket::websocket_connection;
