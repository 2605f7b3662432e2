use std::collections::VecDeque;

use crate::types::{ChatMessage, DEFAULT_MAX_QUEUE_SIZE};

/// Bounded FIFO buffer for envelopes that could not be sent immediately.
///
/// Overflow policy is drop-oldest: the head of the queue is evicted to make
/// room for a new entry, so the most recent `max_size` messages survive an
/// outage. Contents are in-memory only and survive a reconnect, not a
/// process restart.
pub struct OutboundQueue {
    items: VecDeque<ChatMessage>,
    max_size: usize,
}

impl OutboundQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Append to the tail, evicting from the head when full
    pub fn enqueue(&mut self, message: ChatMessage) {
        if self.max_size == 0 {
            tracing::warn!("Outbound queue disabled, dropping message type={}", message.kind);
            return;
        }
        while self.items.len() >= self.max_size {
            if let Some(dropped) = self.items.pop_front() {
                tracing::warn!(
                    "Outbound queue full ({}), dropping oldest message type={}",
                    self.max_size,
                    dropped.kind
                );
            }
        }
        self.items.push_back(message);
    }

    /// Take the head for a send attempt
    pub fn pop_front(&mut self) -> Option<ChatMessage> {
        self.items.pop_front()
    }

    /// Restore a message whose send attempt failed back to the head,
    /// preserving FIFO order for the next flush pass
    pub fn requeue_front(&mut self, message: ChatMessage) {
        self.items.push_front(message);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(kind: &str) -> ChatMessage {
        ChatMessage::new(kind)
    }

    fn kinds(queue: &mut OutboundQueue) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(m) = queue.pop_front() {
            out.push(m.kind);
        }
        out
    }

    #[test]
    fn test_overflow_evicts_oldest_first() {
        let mut queue = OutboundQueue::new(2);
        queue.enqueue(msg("A"));
        queue.enqueue(msg("B"));
        queue.enqueue(msg("C"));

        assert_eq!(queue.len(), 2);
        assert_eq!(kinds(&mut queue), vec!["B", "C"]);
    }

    #[test]
    fn test_duplicates_are_allowed() {
        let mut queue = OutboundQueue::new(4);
        queue.enqueue(msg("A"));
        queue.enqueue(msg("A"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_partial_flush_preserves_order() {
        // Mirrors the client's flush loop: pop, attempt, requeue on failure
        // and stop. Send fails on the second message.
        let mut queue = OutboundQueue::new(10);
        queue.enqueue(msg("A"));
        queue.enqueue(msg("B"));
        queue.enqueue(msg("C"));

        let mut sent = Vec::new();
        let mut calls = 0;
        while let Some(m) = queue.pop_front() {
            calls += 1;
            if calls == 2 {
                queue.requeue_front(m);
                break;
            }
            sent.push(m.kind);
        }

        assert_eq!(sent, vec!["A"]);
        assert_eq!(kinds(&mut queue), vec!["B", "C"]);
    }

    #[test]
    fn test_zero_capacity_drops_everything() {
        let mut queue = OutboundQueue::new(0);
        queue.enqueue(msg("A"));
        assert!(queue.is_empty());
    }
}
