use futures::stream::SplitSink;
use futures::SinkExt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use crate::types::{ChatError, ChatMessage, Result, LOGOUT_CLOSE_REASON};
use crate::websocket::WsStream;

/// Connection status of the client. Transitions are only made by
/// [`ChatClient`](super::ChatClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Whether a close frame is the server's terminal "do not reconnect" signal:
/// normal closure (1000) with the reason `"Logout"`. Every other close is
/// treated as recoverable.
pub fn is_logout_close(frame: Option<&CloseFrame>) -> bool {
    match frame {
        Some(frame) => {
            frame.code == CloseCode::Normal && frame.reason.as_str() == LOGOUT_CLOSE_REASON
        }
        None => false,
    }
}

/// Owns the single live transport handle and the authoritative status value.
pub struct ConnectionManager {
    ws_write: Arc<RwLock<Option<SplitSink<WsStream, Message>>>>,
    status: Arc<RwLock<ConnectionStatus>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            ws_write: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(ConnectionStatus::Disconnected)),
        }
    }

    /// Clears the writer (used when the transport drops)
    pub async fn clear_writer(&self) {
        let mut ws = self.ws_write.write().await;
        *ws = None;
    }

    /// Whether a transport handle is currently held
    pub async fn has_writer(&self) -> bool {
        self.ws_write.read().await.is_some()
    }

    pub async fn status(&self) -> ConnectionStatus {
        *self.status.read().await
    }

    pub async fn set_status(&self, new_status: ConnectionStatus) {
        let mut status = self.status.write().await;
        *status = new_status;
    }

    /// Claims the `Disconnected` -> `Connecting` transition in one critical
    /// section. Exactly one of any number of concurrent callers gets `true`;
    /// the losers must not open a transport.
    pub async fn try_begin_connect(&self) -> bool {
        let mut status = self.status.write().await;
        if *status == ConnectionStatus::Disconnected {
            *status = ConnectionStatus::Connecting;
            true
        } else {
            false
        }
    }

    /// Installs the write sink and flips the status to `Connected`, but only
    /// while the connect attempt still owns the connection. A disconnect that
    /// completed during the handshake has already moved the status off
    /// `Connecting`, so the fresh transport is refused and dropped by the
    /// caller.
    pub async fn install_writer(&self, writer: SplitSink<WsStream, Message>) -> bool {
        let mut status = self.status.write().await;
        if *status != ConnectionStatus::Connecting {
            return false;
        }
        let mut ws = self.ws_write.write().await;
        *ws = Some(writer);
        *status = ConnectionStatus::Connected;
        true
    }

    pub async fn is_connected(&self) -> bool {
        *self.status.read().await == ConnectionStatus::Connected
    }

    /// Sends an envelope through the WebSocket connection
    pub async fn send_message(&self, message: &ChatMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;

        let mut ws_guard = self.ws_write.write().await;
        match ws_guard.as_mut() {
            Some(ws) => {
                ws.send(Message::Text(json.into())).await?;
                Ok(())
            }
            None => Err(ChatError::NotConnected),
        }
    }

    /// Sends a close frame with the given code and reason, then drops the
    /// transport handle. A failed close send only means the peer is already
    /// gone, so it is logged rather than surfaced.
    pub async fn close(&self, code: u16, reason: &str) {
        let mut ws_guard = self.ws_write.write().await;
        if let Some(ws) = ws_guard.as_mut() {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: Utf8Bytes::from(reason.to_string()),
            };
            if let Err(e) = ws.send(Message::Close(Some(frame))).await {
                tracing::debug!("Close frame send failed: {}", e);
            }
        }
        *ws_guard = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(code: CloseCode, reason: &str) -> CloseFrame {
        CloseFrame {
            code,
            reason: Utf8Bytes::from(reason.to_string()),
        }
    }

    #[test]
    fn test_logout_close_is_terminal() {
        let logout = frame(CloseCode::Normal, "Logout");
        assert!(is_logout_close(Some(&logout)));
    }

    #[test]
    fn test_other_closes_are_recoverable() {
        let wrong_reason = frame(CloseCode::Normal, "Server restart");
        assert!(!is_logout_close(Some(&wrong_reason)));

        let wrong_code = frame(CloseCode::Away, "Logout");
        assert!(!is_logout_close(Some(&wrong_code)));

        assert!(!is_logout_close(None));
    }

    #[tokio::test]
    async fn test_send_without_writer_fails() {
        let connection = ConnectionManager::new();
        let result = connection.send_message(&ChatMessage::new("x")).await;
        assert!(matches!(result, Err(ChatError::NotConnected)));
    }

    #[tokio::test]
    async fn test_begin_connect_claims_exclusively() {
        let connection = ConnectionManager::new();

        assert!(connection.try_begin_connect().await);
        assert_eq!(connection.status().await, ConnectionStatus::Connecting);

        // A racing second attempt loses while the first owns the connection
        assert!(!connection.try_begin_connect().await);

        connection.set_status(ConnectionStatus::Connected).await;
        assert!(!connection.try_begin_connect().await);

        connection.set_status(ConnectionStatus::Disconnected).await;
        assert!(connection.try_begin_connect().await);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let connection = ConnectionManager::new();
        assert_eq!(connection.status().await, ConnectionStatus::Disconnected);
        assert!(!connection.is_connected().await);

        connection.set_status(ConnectionStatus::Connected).await;
        assert!(connection.is_connected().await);
    }
}
