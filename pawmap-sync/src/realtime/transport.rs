//! Byte transport under the STOMP session
//!
//! The subscriber only needs "send a text frame" and "next chunk of bytes";
//! [`WebSocketConnector`] provides both over `tokio-tungstenite`.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::RealtimeError;

/// An open connection to the broker
#[async_trait]
pub trait RealtimeTransport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), RealtimeError>;

    /// Next chunk of inbound bytes. `None` once the connection is closed.
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, RealtimeError>>;

    async fn close(&mut self);
}

/// Opens transports; called once per (re)connect
#[async_trait]
pub trait Connector: Debug + Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RealtimeTransport>, RealtimeError>;
}

/// WebSocket connector for `ws://` / `wss://` endpoints
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn RealtimeTransport>, RealtimeError> {
        tracing::info!(url = %self.url, "Connecting to realtime broker");
        let (stream, response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<(), RealtimeError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, RealtimeError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            match message {
                Message::Text(text) => return Some(Ok(text.as_str().as_bytes().to_vec())),
                Message::Binary(bytes) => return Some(Ok(bytes.to_vec())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "WebSocket closed by broker");
                    return None;
                }
                // ping / pong are answered by tungstenite
                _ => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
