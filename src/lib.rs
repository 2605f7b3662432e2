//! # Quest Chat Client
//!
//! Realtime connection layer for the Easter Quest admin frontend: a single
//! persistent WebSocket to the chat/notification endpoint with automatic
//! reconnection (exponential backoff), heartbeats, and a bounded outbound
//! queue that rides out disconnection windows.
//!
//! ## Example
//!
//! ```no_run
//! use quest_chat_client::{chat_url, ChatClient, ChatClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(
//!         chat_url("quest.example", true),
//!         ChatClientOptions::default(),
//!     )?;
//!
//!     let listener = client.on_message(|msg| {
//!         println!("{}: {:?}", msg.kind, msg.data);
//!     });
//!
//!     client.connect().await?;
//!     // ...
//!     client.off_message(listener);
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use client::{ChatClient, ChatClientBuilder, ChatClientOptions, ConnectionStatus};
pub use messaging::{ListenerId, MessageDispatcher, OutboundQueue};
pub use types::{ChatError, ChatMessage, Result};
pub use websocket::chat_url;
