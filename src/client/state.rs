use tokio::sync::watch;

use super::connection::ConnectionStatus;
use crate::infrastructure::{Backoff, TaskManager};
use crate::messaging::OutboundQueue;

/// Consolidated mutable state for ChatClient
/// Using a single struct reduces lock contention
pub struct ClientState {
    /// Outbound messages waiting for a connection
    pub queue: OutboundQueue,

    /// Reconnect attempt bookkeeping
    pub backoff: Backoff,

    /// Background task manager (read task, heartbeat)
    pub task_manager: TaskManager,

    /// Whether a queue flush is currently in progress (new sends queue
    /// behind it instead of overtaking)
    pub flushing: bool,

    /// Whether the disconnect was manual (prevents auto-reconnect)
    pub was_manual_disconnect: bool,

    /// Most recent connection-level failure, for the UI layer to render
    pub last_error: Option<String>,

    /// Sender for state change notifications
    pub state_change_tx: Option<watch::Sender<(ConnectionStatus, bool)>>,
}

impl ClientState {
    pub fn new(queue: OutboundQueue, backoff: Backoff) -> Self {
        Self {
            queue,
            backoff,
            task_manager: TaskManager::new(),
            flushing: false,
            was_manual_disconnect: false,
            last_error: None,
            state_change_tx: None,
        }
    }

    /// Notify status change watchers
    pub fn notify_status_change(&self, status: ConnectionStatus, manual: bool) {
        if let Some(tx) = &self.state_change_tx {
            if tx.send((status, manual)).is_err() {
                tracing::debug!(
                    "State change watcher disconnected, could not notify status: {:?}",
                    status
                );
            }
        }
    }
}
