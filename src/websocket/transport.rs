//! Transport Seam
//!
//! The hub never touches sockets directly. A session's writer loop owns a
//! [`FrameSink`] and its reader loop owns a [`FrameSource`]; the axum
//! WebSocket halves implement both.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;

/// Frame received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

/// Transport-level failure, local to one session
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),
}

/// Outbound half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Release the connection. Errors are irrelevant at this point.
    async fn close(&mut self);
}

/// Inbound half of a connection
///
/// `next_frame` must be cancel-safe: the reader loop races it against the
/// session's close signal.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the peer is gone
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>>;
}

/// Writer half of an axum WebSocket
pub struct WsSink(SplitSink<WebSocket, Message>);

impl WsSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self(sink)
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

/// Reader half of an axum WebSocket
pub struct WsSource(SplitStream<WebSocket>);

impl WsSource {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self(stream)
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        let result = self.0.next().await?;
        Some(
            result
                .map(|message| match message {
                    Message::Text(text) => InboundFrame::Text(text),
                    Message::Binary(data) => InboundFrame::Binary(data),
                    Message::Ping(_) => InboundFrame::Ping,
                    Message::Pong(_) => InboundFrame::Pong,
                    Message::Close(_) => InboundFrame::Close,
                })
                .map_err(|e| TransportError::Receive(e.to_string())),
        )
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Channel-backed transport for exercising sessions without sockets

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    pub struct ChannelSink {
        frames: mpsc::UnboundedSender<String>,
        closed: Arc<AtomicBool>,
    }

    pub struct ChannelSource {
        inbound: mpsc::UnboundedReceiver<InboundFrame>,
    }

    /// The test's side of the fake connection
    pub struct Peer {
        pub frames: mpsc::UnboundedReceiver<String>,
        pub inbound: mpsc::UnboundedSender<InboundFrame>,
        closed: Arc<AtomicBool>,
    }

    impl Peer {
        /// Whether the session released its sink
        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    pub fn connection() -> (ChannelSink, ChannelSource, Peer) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        (
            ChannelSink {
                frames: frames_tx,
                closed: Arc::clone(&closed),
            },
            ChannelSource { inbound: inbound_rx },
            Peer {
                frames: frames_rx,
                inbound: inbound_tx,
                closed,
            },
        )
    }

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.frames
                .send(text)
                .map_err(|_| TransportError::Send("peer dropped".to_string()))
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl FrameSource for ChannelSource {
        async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
            self.inbound.recv().await.map(Ok)
        }
    }
}
