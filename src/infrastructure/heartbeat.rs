use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time;

use crate::client::{ClientState, ConnectionManager};
use crate::types::{ChatMessage, DEFAULT_HEARTBEAT_INTERVAL};

/// Periodic liveness probe for an open connection.
///
/// Each tick sends a `{"type":"ping"}` envelope while the connection is open.
/// A failed ping is logged and the timer keeps running; noticing real
/// disconnection is the close handler's job. Ticks while not connected are
/// no-ops, so the task is harmless across a reconnect window until it is
/// aborted and respawned.
pub struct HeartbeatManager {
    interval: Duration,
    connection: Weak<ConnectionManager>,
}

impl HeartbeatManager {
    pub fn new(connection: Weak<ConnectionManager>) -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL),
            connection,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the heartbeat task, tracked by the client's task manager
    pub async fn spawn_on(self, state: &Arc<RwLock<ClientState>>) {
        let mut state = state.write().await;
        state.task_manager.spawn(self.run());
    }

    async fn run(self) {
        // First ping goes out one full interval after connect
        let start = time::Instant::now() + self.interval;
        let mut interval_timer = time::interval_at(start, self.interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval_timer.tick().await;

            // Client dropped, exit heartbeat task
            let connection = match self.connection.upgrade() {
                Some(conn) => conn,
                None => break,
            };

            if !connection.is_connected().await {
                continue;
            }

            match connection.send_message(&ChatMessage::ping()).await {
                Ok(_) => tracing::debug!("Sent heartbeat ping"),
                Err(e) => tracing::warn!("Heartbeat ping failed: {}", e),
            }
        }
    }
}
