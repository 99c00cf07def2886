//! Queued event manager shared by the observable models
//!
//! Models push events with [`EventManager::emit`]; consumers either register
//! callbacks, subscribe to a channel, or drain the queue after each operation.

use std::collections::VecDeque;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Event listener callback type
pub type EventCallback<E> = Box<dyn Fn(&E) + Send + Sync>;

pub struct EventManager<E> {
    /// Event listeners, called in registration order
    listeners: Vec<EventCallback<E>>,
    /// Channel subscribers; disconnected ones are dropped on emit
    subscribers: Vec<Sender<E>>,
    /// Event queue for processing
    event_queue: VecDeque<E>,
}

impl<E> Default for EventManager<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            subscribers: Vec::new(),
            event_queue: VecDeque::new(),
        }
    }
}

impl<E> std::fmt::Debug for EventManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.subscribers.len())
            .field("pending", &self.event_queue.len())
            .finish()
    }
}

impl<E: Clone> EventManager<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event listener
    pub fn on<F>(&mut self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(callback));
    }

    /// Receive every future event on a channel
    pub fn subscribe(&mut self) -> Receiver<E> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Emit an event: listeners and subscribers are notified synchronously,
    /// and the event is queued for `drain`.
    pub fn emit(&mut self, event: E) {
        for callback in &self.listeners {
            callback(&event);
        }
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        self.event_queue.push_back(event);
    }

    /// Take all queued events
    pub fn drain(&mut self) -> Vec<E> {
        self.event_queue.drain(..).collect()
    }

    /// Get number of pending events
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Drop every listener and subscriber
    pub fn stop_listening(&mut self) {
        self.listeners.clear();
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_emit_notifies_listeners_and_subscribers() {
        let mut events = EventManager::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        events.on(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let receiver = events.subscribe();

        events.emit(7);
        events.emit(8);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![7, 8]);
        assert_eq!(events.pending_events(), 2);
        assert_eq!(events.drain(), vec![7, 8]);
        assert_eq!(events.pending_events(), 0);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut events = EventManager::<u32>::new();
        let receiver = events.subscribe();
        drop(receiver);
        events.emit(1);
        assert_eq!(events.subscribers.len(), 0);
    }
}
