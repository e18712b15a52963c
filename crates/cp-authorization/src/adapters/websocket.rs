//! WebSocket connection adapter.
//!
//! Splits an already-open `WebSocketStream` into a frame sink and a frame
//! source. Establishing the connection (URL, subprotocol, TLS) and
//! reconnecting are the caller's concern.

use crate::domain::error::ConnectionError;
use crate::ports::{DuplexConnection, FrameSink, FrameSource};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

pub struct WebSocketSink<S> {
    inner: Mutex<SplitSink<WebSocketStream<S>, Message>>,
}

pub struct WebSocketSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

fn map_ws_error(
    error: tungstenite::Error,
    on_other: fn(String) -> ConnectionError,
) -> ConnectionError {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ConnectionError::Closed
        }
        other => on_other(other.to_string()),
    }
}

#[async_trait]
impl<S> FrameSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, frame: String) -> Result<(), ConnectionError> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Text(frame.into()))
            .await
            .map_err(|e| map_ws_error(e, ConnectionError::Send))
    }
}

#[async_trait]
impl<S> FrameSource for WebSocketSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn receive(&mut self) -> Result<String, ConnectionError> {
        while let Some(message) = self.inner.next().await {
            match message.map_err(|e| map_ws_error(e, ConnectionError::Receive))? {
                Message::Text(text) => return Ok(text.to_string()),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(text),
                    Err(_) => debug!(len = data.len(), "Skipping non-UTF-8 binary frame"),
                },
                Message::Close(frame) => {
                    debug!(?frame, "WebSocket closed by peer");
                    return Err(ConnectionError::Closed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Err(ConnectionError::Closed)
    }
}

/// Wrap an open WebSocket as a [`DuplexConnection`].
pub fn websocket_connection<S>(stream: WebSocketStream<S>) -> DuplexConnection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, source) = stream.split();
    DuplexConnection::new(
        Arc::new(WebSocketSink {
            inner: Mutex::new(sink),
        }),
        Box::new(WebSocketSource { inner: source }),
    )
}
