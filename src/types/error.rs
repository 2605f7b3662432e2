use thiserror::Error;

/// Errors that can occur when using the chat client.
#[derive(Error, Debug)]
pub enum ChatError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The configured endpoint is not a usable ws/wss URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, ChatError>`.
pub type Result<T> = std::result::Result<T, ChatError>;
