use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::{watch, RwLock};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use super::connection::is_logout_close;
use super::{ChatClientBuilder, ChatClientOptions, ClientState, ConnectionManager, ConnectionStatus};
use crate::infrastructure::HeartbeatManager;
use crate::messaging::{ListenerId, MessageDispatcher};
use crate::types::{ChatMessage, Result, RECONNECT_GRACE_MS, WS_CLOSE_NORMAL};
use crate::websocket::WebSocketFactory;

/// The main entry point for the Easter Quest realtime chat layer.
///
/// `ChatClient` owns a single persistent WebSocket connection, reconnects
/// with exponential backoff after unplanned drops, keeps the link alive with
/// heartbeat pings, buffers outbound messages while disconnected, and routes
/// inbound envelopes to registered listeners.
///
/// # Example
///
/// ```no_run
/// use quest_chat_client::{chat_url, ChatClient, ChatClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ChatClient::new(
///     chat_url("quest.example", true),
///     ChatClientOptions::default(),
/// )?;
///
/// client.connect().await?;
/// let listener = client.on_message(|msg| println!("received {}", msg.kind));
/// // Use the client...
/// client.off_message(listener);
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) endpoint: String,
    pub(crate) options: ChatClientOptions,

    // Connection manager (single transport handle + status)
    pub(crate) connection: Arc<ConnectionManager>,

    // Consolidated mutable state
    pub(crate) state: Arc<RwLock<ClientState>>,

    // Inbound listener registry
    pub(crate) dispatcher: MessageDispatcher,

    // Public status observable
    pub(crate) status_tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl ChatClient {
    /// Creates a new client.
    ///
    /// This validates the endpoint and spawns the reconnect and
    /// credential-refresh watchers, but only opens the connection here when
    /// `options.auto_connect` is set (the default); otherwise call
    /// [`connect()`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidEndpoint`](crate::types::ChatError::InvalidEndpoint)
    /// or [`ChatError::UrlParse`](crate::types::ChatError::UrlParse) if the
    /// endpoint is not a usable `ws`/`wss` URL.
    pub fn new(endpoint: impl Into<String>, options: ChatClientOptions) -> Result<Self> {
        ChatClientBuilder::new(endpoint, options).map(|builder| builder.build())
    }

    /// Set connection status and notify watchers
    pub(crate) async fn set_status(&self, new_status: ConnectionStatus) {
        self.connection.set_status(new_status).await;
        self.publish_status(new_status).await;
    }

    /// Push an already-applied status to the public watch channel and the
    /// internal state watcher.
    async fn publish_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);

        let state = self.state.read().await;
        state.notify_status_change(status, state.was_manual_disconnect);
    }

    /// Set manual disconnect flag and notify watchers
    pub(crate) async fn set_manual_disconnect(&self, manual: bool) {
        // Read the status before taking the state lock; never hold both
        let status = self.connection.status().await;

        let mut state = self.state.write().await;
        state.was_manual_disconnect = manual;
        state.notify_status_change(status, manual);
    }

    /// Establishes the WebSocket connection.
    ///
    /// Idempotent: if the client is already connecting or connected this
    /// returns immediately without opening a second transport. On success the
    /// backoff attempt count is reset, the heartbeat starts, and any queued
    /// outbound messages are flushed in FIFO order before this method
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket handshake fails; the failure is also
    /// recorded in [`last_error()`](Self::last_error).
    pub async fn connect(&self) -> Result<()> {
        // Claim the connection atomically; a concurrent connect attempt
        // (user call, retry loop, token refresh) loses the claim and returns
        // without opening a second transport.
        if !self.connection.try_begin_connect().await {
            return Ok(());
        }
        self.publish_status(ConnectionStatus::Connecting).await;
        tracing::info!("Connecting to {}", &self.endpoint);

        // A fresh connect attempt always re-arms auto-reconnect, even if
        // the handshake then fails.
        {
            let mut state = self.state.write().await;
            state.was_manual_disconnect = false;
            state.last_error = None;
        }

        let ws_stream = match WebSocketFactory::create(&self.endpoint).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("WebSocket connect failed: {}", e);
                self.state.write().await.last_error = Some(e.to_string());
                self.set_status(ConnectionStatus::Disconnected).await;
                return Err(e);
            }
        };

        let (write_half, mut read_half) = ws_stream.split();

        // A disconnect() issued while the handshake was in flight wins: the
        // manual flag is set before anything else in disconnect_with, and
        // install_writer refuses the sink once the status has left
        // Connecting. Either way the fresh transport never goes live.
        let manual = self.state.read().await.was_manual_disconnect;
        if manual || !self.connection.install_writer(write_half).await {
            tracing::info!("Torn down during handshake, discarding new transport");
            if self.connection.status().await == ConnectionStatus::Connecting {
                self.set_status(ConnectionStatus::Disconnected).await;
            }
            return Ok(());
        }

        // Replace any previous connection's background tasks
        {
            let mut state = self.state.write().await;
            state.task_manager.abort_all();
            state.backoff.reset();
        }

        // install_writer marked the connection Connected before the read
        // task exists: a connection that dies instantly must report its
        // Disconnected strictly after that transition, or the status would
        // wedge at Connected.
        self.publish_status(ConnectionStatus::Connected).await;
        tracing::info!("Connected to chat server");

        // Spawn read task
        let self_cloned = self.clone();
        let dispatcher = self.dispatcher.clone();
        {
            let mut state = self.state.write().await;
            state.task_manager.spawn(async move {
                tracing::debug!("Starting read task");
                while let Some(msg_result) = read_half.next().await {
                    match msg_result {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<ChatMessage>(&text) {
                                Ok(message) => dispatcher.dispatch(&message),
                                Err(e) => {
                                    tracing::warn!(
                                        "Failed to parse message: {} - Raw: {}",
                                        e,
                                        text
                                    );
                                }
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            if is_logout_close(frame.as_ref()) {
                                tracing::info!(
                                    "Server closed connection with logout, reconnect disabled"
                                );
                                self_cloned.set_manual_disconnect(true).await;
                            } else if let Some(close_frame) = &frame {
                                tracing::warn!(
                                    "Server closed connection: code={:?}, reason='{}'",
                                    close_frame.code,
                                    close_frame.reason
                                );
                            } else {
                                tracing::warn!("Server closed connection without close frame");
                            }
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            // Transport-level ping; tungstenite answers it
                            tracing::debug!("Received transport ping ({} bytes)", data.len());
                        }
                        Ok(Message::Pong(_)) => {}
                        Ok(Message::Binary(data)) => {
                            tracing::warn!(
                                "Received unexpected binary message ({} bytes)",
                                data.len()
                            );
                        }
                        Ok(Message::Frame(_)) => {}
                        Err(e) => {
                            tracing::error!("WebSocket read error: {}", e);
                            break;
                        }
                    }
                }
                self_cloned.connection.clear_writer().await;
                self_cloned.set_status(ConnectionStatus::Disconnected).await;
                // Stop the heartbeat too. abort_all covers this task's own
                // handle, so it must come last with no awaits after it.
                self_cloned.state.write().await.task_manager.abort_all();
                tracing::debug!("Read task finished");
            });
        }

        // Spawn heartbeat task
        let heartbeat = HeartbeatManager::new(Arc::downgrade(&self.connection))
            .with_interval(Duration::from_millis(self.options.heartbeat_interval));
        heartbeat.spawn_on(&self.state).await;

        self.flush_queue().await;
        Ok(())
    }

    /// Gracefully disconnects with the default close frame
    /// (code 1000, reason `"Manual disconnect"`).
    ///
    /// This suppresses auto-reconnect until the next [`connect()`](Self::connect)
    /// call and aborts the heartbeat and read tasks. Safe to call when
    /// already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        self.disconnect_with(WS_CLOSE_NORMAL, "Manual disconnect")
            .await
    }

    /// Gracefully disconnects with a specific close code and reason.
    pub async fn disconnect_with(&self, code: u16, reason: &str) -> Result<()> {
        // Set the flag before anything else so a retry sleeping in the
        // backoff loop observes it and stands down.
        self.set_manual_disconnect(true).await;

        {
            let mut state = self.state.write().await;
            state.task_manager.abort_all();
        }

        if self.connection.status().await == ConnectionStatus::Disconnected {
            return Ok(());
        }

        tracing::info!("Disconnecting from chat server");
        self.connection.close(code, reason).await;
        self.set_status(ConnectionStatus::Disconnected).await;
        Ok(())
    }

    /// Tears the connection down and establishes a fresh one.
    ///
    /// Resets the backoff attempt count, disconnects, waits a short grace
    /// period so external state (e.g. refreshed credentials) settles, then
    /// connects again. Queued outbound messages survive the cycle.
    pub async fn reconnect(&self) -> Result<()> {
        tracing::info!("Reconnect requested");
        self.state.write().await.backoff.reset();
        self.disconnect().await?;
        time::sleep(Duration::from_millis(RECONNECT_GRACE_MS)).await;
        self.connect().await
    }

    /// Backoff retry loop driven by the state watcher after an unplanned
    /// disconnect. Retries are unbounded; only a manual disconnect (or the
    /// server's logout close) stops the loop.
    pub(crate) async fn try_reconnect(&self) -> Result<()> {
        loop {
            if self.state.read().await.was_manual_disconnect {
                tracing::info!("Manual disconnect detected, will not attempt to reconnect");
                return Ok(());
            }
            {
                let status = self.connection.status().await;
                if status == ConnectionStatus::Connected || status == ConnectionStatus::Connecting {
                    break;
                }
            }

            let (delay, attempt) = {
                let mut state = self.state.write().await;
                let delay = state.backoff.next_delay();
                (delay, state.backoff.attempts())
            };
            tracing::info!("Attempting to reconnect in {:?} (attempt {})", delay, attempt);
            time::sleep(delay).await;

            // A manual disconnect may have raced with the wait
            if self.state.read().await.was_manual_disconnect {
                return Ok(());
            }

            match self.connect().await {
                Ok(_) => {
                    tracing::info!("Reconnected successfully");
                    break;
                }
                Err(e) => {
                    tracing::error!("Reconnection attempt failed: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Sends an envelope `{"type": kind, ...data}` to the server.
    ///
    /// Returns `true` when the message was transmitted. Returns `false` when
    /// `kind` is blank (nothing is queued), or when the client is offline or
    /// the send fails — in those cases the message is queued and delivered
    /// after the next successful connect.
    pub async fn send_message(&self, kind: &str, data: Map<String, Value>) -> bool {
        if kind.trim().is_empty() {
            tracing::warn!("Refusing to send message with empty type");
            return false;
        }

        let message = ChatMessage::with_data(kind, data);

        // A send racing an in-progress flush (or arriving while older
        // messages are still queued) goes behind them, never ahead.
        let queue_busy = {
            let state = self.state.read().await;
            state.flushing || !state.queue.is_empty()
        };

        if !queue_busy && self.connection.is_connected().await {
            match self.connection.send_message(&message).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!("Send failed, queueing message type={}: {}", message.kind, e);
                }
            }
        }

        let mut state = self.state.write().await;
        state.queue.enqueue(message);
        false
    }

    /// Drain the outbound queue in FIFO order. A failed send restores the
    /// message to the head and aborts the pass; the remainder goes out on
    /// the next connect.
    async fn flush_queue(&self) {
        self.state.write().await.flushing = true;
        let mut flushed = 0usize;
        loop {
            let message = {
                let mut state = self.state.write().await;
                state.queue.pop_front()
            };
            let Some(message) = message else { break };

            if let Err(e) = self.connection.send_message(&message).await {
                tracing::warn!(
                    "Flush interrupted, restoring message type={}: {}",
                    message.kind,
                    e
                );
                self.state.write().await.queue.requeue_front(message);
                break;
            }
            flushed += 1;
        }
        self.state.write().await.flushing = false;
        if flushed > 0 {
            tracing::info!("Flushed {} queued message(s)", flushed);
        }
    }

    /// Registers a listener for all inbound application messages
    /// (heartbeat `pong`s are consumed before dispatch).
    pub fn on_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(callback)
    }

    /// Removes a listener; safe to call more than once with the same id.
    pub fn off_message(&self, id: ListenerId) {
        self.dispatcher.unsubscribe(id);
    }

    /// Number of outbound messages waiting for a connection
    pub async fn queue_size(&self) -> usize {
        self.state.read().await.queue.len()
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.connection.status().await
    }

    /// Most recent connection-level failure, if any
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Watch channel carrying every status transition, for the UI layer
    pub fn status_updates(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_options() -> ChatClientOptions {
        ChatClientOptions {
            auto_connect: false,
            ..Default::default()
        }
    }

    fn offline_client() -> ChatClient {
        // Discard port; nothing listens there
        ChatClient::new("ws://127.0.0.1:9/ws/chat", offline_options()).unwrap()
    }

    #[tokio::test]
    async fn test_connect_is_noop_while_connecting() {
        let client = offline_client();
        client.connection.set_status(ConnectionStatus::Connecting).await;

        client.connect().await.unwrap();

        assert_eq!(client.status().await, ConnectionStatus::Connecting);
        assert_eq!(client.state.read().await.backoff.attempts(), 0);
    }

    #[tokio::test]
    async fn test_connect_is_noop_while_connected() {
        let client = offline_client();
        client.connection.set_status(ConnectionStatus::Connected).await;

        client.connect().await.unwrap();
        assert_eq!(client.status().await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_queues() {
        let client = offline_client();

        let sent = client.send_message("x", Map::new()).await;
        assert!(!sent);
        assert_eq!(client.queue_size().await, 1);
    }

    #[tokio::test]
    async fn test_blank_type_is_rejected_without_queueing() {
        let client = offline_client();

        assert!(!client.send_message("", Map::new()).await);
        assert!(!client.send_message("   ", Map::new()).await);
        assert_eq!(client.queue_size().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_sets_manual_flag() {
        let client = offline_client();

        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();

        assert_eq!(client.status().await, ConnectionStatus::Disconnected);
        assert!(client.state.read().await.was_manual_disconnect);
    }

    #[tokio::test]
    async fn test_logout_close_stops_background_tasks() {
        use futures::SinkExt;
        use tokio::net::TcpListener;
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "Logout".into(),
            })))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client =
            ChatClient::new(format!("ws://{}/ws/chat", addr), offline_options()).unwrap();
        client.connect().await.unwrap();

        let deadline = time::Instant::now() + Duration::from_secs(2);
        while client.is_connected().await {
            assert!(time::Instant::now() < deadline, "close never observed");
            time::sleep(Duration::from_millis(10)).await;
        }
        // Let the read task finish its teardown
        time::sleep(Duration::from_millis(50)).await;

        let state = client.state.read().await;
        assert!(state.was_manual_disconnect);
        assert!(
            state.task_manager.is_empty(),
            "heartbeat left running after terminal close"
        );
    }

    #[tokio::test]
    async fn test_failed_connect_records_last_error() {
        // Port 1 is unbound; the TCP connect is refused immediately
        let client = ChatClient::new("ws://127.0.0.1:1/ws/chat", offline_options()).unwrap();

        let result = client.connect().await;
        assert!(result.is_err());
        assert!(client.last_error().await.is_some());
        assert_eq!(client.status().await, ConnectionStatus::Disconnected);

        // Stop the background retry loop before the test ends
        client.disconnect().await.unwrap();
    }
}
