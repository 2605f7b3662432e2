/// Reserved envelope types (heartbeat layer, never delivered to listeners)
pub mod reserved_events {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

/// WebSocket path of the chat endpoint
pub const CHAT_WS_PATH: &str = "/ws/chat";

/// Normal-closure WebSocket close code
pub const WS_CLOSE_NORMAL: u16 = 1000;

/// Close reason the server sends with code 1000 to signal a terminal logout
pub const LOGOUT_CLOSE_REASON: &str = "Logout";

/// Default backoff base (milliseconds)
pub const DEFAULT_RECONNECT_INTERVAL: u64 = 1000;

/// Default backoff ceiling (milliseconds)
pub const DEFAULT_MAX_RECONNECT_INTERVAL: u64 = 30_000;

/// Default heartbeat interval (milliseconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30_000;

/// Default outbound queue capacity
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Grace period between disconnect and connect during a forced reconnect
/// (lets externally refreshed credentials settle before the new handshake)
pub const RECONNECT_GRACE_MS: u64 = 100;
