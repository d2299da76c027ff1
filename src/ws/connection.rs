//! Upstream feed WebSocket connection
//!
//! Thin wrapper around tokio-tungstenite that yields feed payloads as text.
//! Control frames are handled here so callers only see data.

use crate::log_ws;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::Level;

/// WebSocket connection to the feed server
pub struct FeedConnection {
    /// Underlying WebSocket stream
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Connection state
    state: ConnectionState,
    /// Connection URL (for logging)
    url: String,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Connected and ready
    Connected,
    /// Closed by either side or failed
    Disconnected,
}

/// Errors that can occur with WebSocket connections
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
    #[error("Timeout")]
    Timeout,
    #[error("Not connected")]
    NotConnected,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WebSocketError>;

impl FeedConnection {
    /// Connect to the feed endpoint
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (wss:// or ws://)
    /// * `connect_timeout` - Upper bound for the handshake
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        let (ws_stream, _) = timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| WebSocketError::Timeout)?
            .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;

        if let MaybeTlsStream::Plain(tcp) = ws_stream.get_ref() {
            tcp.set_nodelay(true)
                .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;
        }

        Ok(Self {
            stream: ws_stream,
            state: ConnectionState::Connected,
            url: url.to_string(),
        })
    }

    /// Send a text frame (opaque pass-through payload)
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(Message::text(text.to_owned())).await
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(WebSocketError::NotConnected);
        }

        self.stream
            .send(msg)
            .await
            .map_err(|e| WebSocketError::SendFailed(e.to_string()))?;
        Ok(())
    }

    /// Receive the next feed payload
    ///
    /// Text frames are returned as-is, binary frames when valid UTF-8.
    /// Pings are answered, other control frames skipped.
    /// Returns `Ok(None)` once the server closes the connection.
    pub async fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            if self.state != ConnectionState::Connected {
                return Err(WebSocketError::NotConnected);
            }

            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(WebSocketError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.state = ConnectionState::Disconnected;
                    return Ok(None);
                }
            };

            match msg {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(data) => match decode_binary(&data) {
                    Some(text) => return Ok(Some(text)),
                    None => {
                        log_ws!(Level::DEBUG, len = data.len(), "Skipping non-UTF-8 binary frame");
                    }
                },
                Message::Ping(payload) => {
                    self.send(Message::Pong(payload)).await?;
                }
                Message::Close(_) => {
                    self.state = ConnectionState::Disconnected;
                    return Ok(None);
                }
                Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            let _ = self.stream.close(None).await;
            self.state = ConnectionState::Disconnected;
        }
        Ok(())
    }

    /// Get connection URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Binary frames carry the same JSON text when the server sends them as bytes
fn decode_binary(data: &[u8]) -> Option<String> {
    std::str::from_utf8(data).ok().map(str::to_owned)
}

// Import needed for Stream and Sink traits
use futures_util::{SinkExt, StreamExt};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(ConnectionState::Connected, ConnectionState::Disconnected);
    }

    #[test]
    fn test_websocket_error_display() {
        let err = WebSocketError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_decode_binary() {
        assert_eq!(
            decode_binary(br#"{"type":"spreads","spreads":{}}"#).as_deref(),
            Some(r#"{"type":"spreads","spreads":{}}"#)
        );
        assert_eq!(decode_binary(&[0xff, 0xfe]), None);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 9 (discard) is not expected to run a WebSocket server
        let result = FeedConnection::connect("ws://127.0.0.1:9/ws", Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(WebSocketError::ConnectionFailed(_)) | Err(WebSocketError::Timeout)
        ));
    }
}
