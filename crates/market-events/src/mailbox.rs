use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{EventBus, ListenerId};
use crate::event::{Event, Topic};

/// Queue that a component subscribes with, then drains on its own tick.
///
/// Delivery into the queue happens synchronously inside `publish`; the owner
/// decides when to act on what arrived.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    queue: Arc<Mutex<Vec<Event>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this mailbox to `topic` under `listener`.
    pub fn subscribe(&self, bus: &EventBus, topic: Topic, listener: ListenerId) -> bool {
        let queue = Arc::clone(&self.queue);
        bus.subscribe(topic, listener, move |event| queue.lock().push(event.clone()))
    }

    /// Take everything delivered so far, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.queue.lock())
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_collects_in_order() {
        let bus = EventBus::new();
        let mailbox = Mailbox::new();
        let listener = bus.register_listener();
        assert!(mailbox.subscribe(&bus, Topic::StockPlaced, listener));

        for shelf in 0..3 {
            bus.publish(Event::StockPlaced {
                shelf: market_core::ShelfId(shelf),
            });
        }
        bus.publish(Event::StoreClosing);

        let drained = mailbox.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(
            drained[0],
            Event::StockPlaced {
                shelf: market_core::ShelfId(0)
            }
        );
        assert!(mailbox.is_empty());
    }
}
