// Module declarations
mod builder;
mod connection;
mod core;
mod state;

// Public API exports
pub use builder::{ChatClientBuilder, ChatClientOptions};
pub use connection::{is_logout_close, ConnectionManager, ConnectionStatus};
pub use core::ChatClient;
pub use state::ClientState;
