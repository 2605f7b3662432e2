// Messaging module - Listener dispatch and outbound buffering
pub mod dispatcher;
pub mod queue;

pub use dispatcher::{ListenerId, MessageDispatcher};
pub use queue::OutboundQueue;
