//! Wire codec for the JSON-array envelope.
//!
//! ```text
//! outgoing call:      [2, "<messageId>", "<action>", {payload}]
//! incoming response:  [3, "<messageId>", {payload}]
//! ```
//!
//! Only position 1 (message id) and position 2 (payload) of an inbound frame
//! are read. The type discriminant is kept for logging but never trusted.

use crate::domain::error::DecodeError;
use crate::domain::message_id::MessageId;
use crate::domain::schema::ActionName;
use serde_json::{json, Value};

/// Type discriminant of an outgoing call.
pub const CALL: u64 = 2;

/// Type discriminant of a call result.
pub const CALL_RESULT: u64 = 3;

/// Minimum number of elements in an inbound frame.
const MIN_FRAME_LEN: usize = 3;

/// An outbound request.
///
/// Only the `(message_id, action)` pair outlives the send; the payload is
/// dropped once the frame is on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub message_id: MessageId,
    pub action: ActionName,
    pub payload: Value,
}

impl Call {
    pub fn new(message_id: MessageId, action: ActionName, payload: Value) -> Self {
        Self {
            message_id,
            action,
            payload,
        }
    }

    /// Serialize to the wire form.
    pub fn encode(&self) -> String {
        encode_call(&self.message_id, self.action.as_str(), &self.payload)
    }
}

/// A decoded inbound frame. Lives for exactly one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingFrame {
    /// Element 0, if it was an unsigned integer.
    pub message_type: Option<u64>,
    pub message_id: MessageId,
    pub payload: Value,
}

/// Produce `[2, messageId, action, payload]`.
///
/// The payload is not inspected; its shape is the sender's responsibility.
pub fn encode_call(message_id: &MessageId, action: &str, payload: &Value) -> String {
    json!([CALL, message_id.as_str(), action, payload]).to_string()
}

/// Parse an inbound frame.
pub fn decode_frame(raw: &str) -> Result<IncomingFrame, DecodeError> {
    let Value::Array(items) = serde_json::from_str::<Value>(raw)? else {
        return Err(DecodeError::NotAnArray);
    };

    let len = items.len();
    if len < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort {
            len,
            min: MIN_FRAME_LEN,
        });
    }

    let mut items = items.into_iter();
    let message_type = items.next().and_then(|v| v.as_u64());
    let Some(Value::String(id)) = items.next() else {
        return Err(DecodeError::MessageIdNotString);
    };
    let payload = items.next().unwrap_or(Value::Null);

    Ok(IncomingFrame {
        message_type,
        message_id: MessageId::from(id),
        payload,
    })
}

/// Parse an inbound frame, rejecting anything larger than `max_size` bytes
/// before touching the JSON parser.
pub fn decode_frame_bounded(raw: &str, max_size: usize) -> Result<IncomingFrame, DecodeError> {
    if raw.len() > max_size {
        return Err(DecodeError::FrameTooLarge {
            size: raw.len(),
            max: max_size,
        });
    }
    decode_frame(raw)
}
