use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::ChatMessage;

type Listener = Arc<dyn Fn(&ChatMessage) + Send + Sync>;

/// Handle returned by [`MessageDispatcher::subscribe`]; pass it back to
/// [`MessageDispatcher::unsubscribe`] to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Routes inbound application messages to registered listeners.
///
/// Listeners are invoked in registration order against a snapshot of the
/// registry, so subscribing or unsubscribing from inside a callback cannot
/// corrupt the iteration. A panicking listener is isolated and logged; the
/// remaining listeners still run. Heartbeat acknowledgements (`"pong"`) are
/// consumed here and never reach a listener.
#[derive(Clone)]
pub struct MessageDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a listener for all inbound application messages
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.write_listeners().push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener; safe to call more than once with the same id
    pub fn unsubscribe(&self, id: ListenerId) {
        self.write_listeners().retain(|(lid, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.read_listeners().len()
    }

    /// Deliver a parsed envelope to every registered listener
    pub fn dispatch(&self, message: &ChatMessage) {
        if message.is_pong() {
            tracing::debug!("Received heartbeat pong");
            return;
        }

        // Snapshot before invoking so callbacks may (un)subscribe freely.
        let snapshot: Vec<(ListenerId, Listener)> = self.read_listeners().clone();
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                tracing::error!(
                    "Message listener {:?} panicked on message type={}",
                    id,
                    message.kind
                );
            }
        }
    }

    fn read_listeners(&self) -> RwLockReadGuard<'_, Vec<(ListenerId, Listener)>> {
        // Listeners run outside the lock, so a poisoned lock only means a
        // panic elsewhere; the registry itself is still coherent.
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_listeners(&self) -> RwLockWriteGuard<'_, Vec<(ListenerId, Listener)>> {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_pong_reaches_no_listeners() {
        let dispatcher = MessageDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);
        dispatcher.subscribe(move |_| {
            calls_in.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch(&ChatMessage::new("pong"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        dispatcher.dispatch(&ChatMessage::new("notice"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let dispatcher = MessageDispatcher::new();
        dispatcher.subscribe(|_| panic!("listener blew up"));

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);
        dispatcher.subscribe(move |_| {
            calls_in.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch(&ChatMessage::new("notice"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let dispatcher = MessageDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order_in = Arc::clone(&order);
            dispatcher.subscribe(move |_| {
                order_in.lock().unwrap().push(label);
            });
        }

        dispatcher.dispatch(&ChatMessage::new("notice"));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let dispatcher = MessageDispatcher::new();
        let id = dispatcher.subscribe(|_| {});
        assert_eq!(dispatcher.listener_count(), 1);

        dispatcher.unsubscribe(id);
        dispatcher.unsubscribe(id);
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_is_safe() {
        let dispatcher = MessageDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let dispatcher_in = dispatcher.clone();
        let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let id_slot_in = Arc::clone(&id_slot);
        let calls_in = Arc::clone(&calls);
        let id = dispatcher.subscribe(move |_| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *id_slot_in.lock().unwrap() {
                dispatcher_in.unsubscribe(id);
            }
        });
        *id_slot.lock().unwrap() = Some(id);

        dispatcher.dispatch(&ChatMessage::new("notice"));
        dispatcher.dispatch(&ChatMessage::new("notice"));

        // Listener removed itself during the first dispatch
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count(), 0);
    }
}
