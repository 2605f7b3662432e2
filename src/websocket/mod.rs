pub mod factory;

pub use factory::{WebSocketFactory, WsStream};

use crate::types::CHAT_WS_PATH;

/// Build the chat endpoint URL for a host: `wss` when the hosting page is
/// served over TLS, `ws` otherwise.
pub fn chat_url(host: &str, secure: bool) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!("{}://{}{}", scheme, host, CHAT_WS_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_scheme_follows_tls() {
        assert_eq!(chat_url("quest.example", true), "wss://quest.example/ws/chat");
        assert_eq!(chat_url("localhost:8080", false), "ws://localhost:8080/ws/chat");
    }
}
