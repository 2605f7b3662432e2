use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use url::Url;

use super::{ChatClient, ClientState, ConnectionManager, ConnectionStatus};
use crate::infrastructure::Backoff;
use crate::messaging::{MessageDispatcher, OutboundQueue};
use crate::types::{
    ChatError, Result, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_MAX_RECONNECT_INTERVAL, DEFAULT_RECONNECT_INTERVAL,
};

/// Configuration for [`ChatClient`]. All fields have working defaults.
#[derive(Debug, Clone)]
pub struct ChatClientOptions {
    /// Connect in the background as soon as the client is built. Default: `true`.
    pub auto_connect: bool,
    /// Backoff base delay in milliseconds. Default: 1000.
    pub reconnect_interval: u64,
    /// Backoff ceiling in milliseconds. Default: 30000.
    pub max_reconnect_interval: u64,
    /// Heartbeat ping interval in milliseconds. Default: 30000.
    pub heartbeat_interval: u64,
    /// Outbound queue capacity. Default: 100.
    pub max_queue_size: usize,
    /// External credential-refresh signal. Each event forces a
    /// disconnect / grace-delay / connect cycle against the new credentials.
    pub token_refresh: Option<broadcast::Sender<()>>,
}

impl Default for ChatClientOptions {
    fn default() -> Self {
        Self {
            auto_connect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_interval: DEFAULT_MAX_RECONNECT_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            token_refresh: None,
        }
    }
}

/// Builder for ChatClient that handles initialization and spawns the
/// long-lived watcher tasks.
pub struct ChatClientBuilder {
    endpoint: String,
    options: ChatClientOptions,
}

impl ChatClientBuilder {
    /// Create a new builder, validating the endpoint URL
    pub fn new(endpoint: impl Into<String>, options: ChatClientOptions) -> Result<Self> {
        let endpoint = endpoint.into();

        let url = Url::parse(&endpoint)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ChatError::InvalidEndpoint(format!(
                "expected ws:// or wss:// URL, got {}",
                endpoint
            )));
        }

        Ok(Self { endpoint, options })
    }

    /// Build the client and spawn background tasks
    pub fn build(self) -> ChatClient {
        let queue = OutboundQueue::new(self.options.max_queue_size);
        let backoff = Backoff::new(
            self.options.reconnect_interval,
            self.options.max_reconnect_interval,
        );
        let mut client_state = ClientState::new(queue, backoff);

        // Initialize state watcher channel
        let (state_tx, state_rx) = watch::channel((ConnectionStatus::Disconnected, false));
        client_state.state_change_tx = Some(state_tx);

        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);

        let client = ChatClient {
            endpoint: self.endpoint,
            options: self.options,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(client_state)),
            dispatcher: MessageDispatcher::new(),
            status_tx: Arc::new(status_tx),
        };

        // Spawn reconnection watcher task
        let client_for_watcher = client.clone();
        tokio::spawn(async move {
            let mut rx = state_rx;

            while rx.changed().await.is_ok() {
                let (status, was_manual) = *rx.borrow_and_update();

                // Reconnect if disconnected AND not manual
                if matches!(status, ConnectionStatus::Disconnected) && !was_manual {
                    tracing::info!("State watcher detected disconnect, attempting reconnection...");

                    if let Err(e) = client_for_watcher.try_reconnect().await {
                        tracing::error!("Reconnection watcher failed: {}", e);
                    }
                }
            }
            tracing::debug!("Reconnection watcher task finished");
        });

        // Spawn credential-refresh watcher task
        if let Some(signal) = &client.options.token_refresh {
            let mut rx = signal.subscribe();
            let client_for_refresh = client.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(()) => {
                            // Nothing to cycle when no transport is held
                            if !client_for_refresh.connection.has_writer().await {
                                continue;
                            }
                            tracing::info!("Token refreshed, cycling connection");
                            if let Err(e) = client_for_refresh.reconnect().await {
                                tracing::error!("Reconnect after token refresh failed: {}", e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "Token refresh watcher lagged, skipped {} signals",
                                skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                tracing::debug!("Token refresh watcher task finished");
            });
        }

        if client.options.auto_connect {
            let client_for_connect = client.clone();
            tokio::spawn(async move {
                if let Err(e) = client_for_connect.connect().await {
                    tracing::error!("Initial connect failed: {}", e);
                }
            });
        }

        client
    }
}
