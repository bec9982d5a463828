//! Feed transport: WebSocket connection and its event stream

use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use url::Url;

/// Events delivered by a transport, in order.
///
/// `Close` arrives exactly once per connection; nothing follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(String),
    Close,
}

/// Source of transport events for the feed adapter
#[async_trait]
pub trait Transport: Send {
    /// Next event, or `None` once `Close` has been delivered
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Release the underlying connection
    async fn close(&mut self) -> Result<(), TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport built on tokio-tungstenite
pub struct WebSocketTransport {
    stream: WsStream,
    opened: bool,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a WebSocket connection, failing after `timeout`
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        tracing::info!("Connecting to {}", url);

        tokio::select! {
            result = connect_async(url) => {
                match result {
                    Ok((stream, _)) => {
                        tracing::info!("WebSocket connection established");
                        Ok(Self { stream, opened: false, closed: false })
                    }
                    Err(e) => Err(TransportError::EstablishmentFailed(e.to_string())),
                }
            }
            _ = sleep(timeout) => {
                Err(TransportError::Timeout(format!("no handshake after {:?}", timeout)))
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if !self.opened {
            self.opened = true;
            return Some(TransportEvent::Open);
        }

        if self.closed {
            return None;
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(TransportEvent::Message(text)),
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!("Ignoring binary frame: {} bytes", data.len());
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    tracing::trace!("Heartbeat frame");
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Server closed WebSocket: {:?}", frame);
                    self.closed = true;
                    return Some(TransportEvent::Close);
                }
                Some(Err(e)) => return Some(TransportEvent::Error(e.to_string())),
                None => {
                    self.closed = true;
                    return Some(TransportEvent::Close);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;

        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::ConnectionLost(e.to_string())),
        }
    }
}

/// In-process transport fed through a channel, for replaying recorded feeds.
///
/// Emits `Close` when the sender side is dropped, unless one was sent already.
pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    closed: bool,
}

impl ChannelTransport {
    pub fn pair() -> (mpsc::UnboundedSender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, closed: false })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.closed {
            return None;
        }

        let event = self.rx.recv().await.unwrap_or(TransportEvent::Close);
        if event == TransportEvent::Close {
            self.closed = true;
        }
        Some(event)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.rx.close();
        Ok(())
    }
}
