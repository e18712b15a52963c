//! Ports (trait seams) for the charge point core.

pub mod outbound;

pub use outbound::{DuplexConnection, FrameSink, FrameSource};
