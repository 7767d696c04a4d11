use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::event::{Event, Topic};

/// A listener callback. Shared so a publish can run a snapshot of the
/// subscriber list without holding the registry lock.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identity of a subscribing component. One component holds one id and uses
/// it for all of its subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Subscription {
    listener: ListenerId,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    topics: HashMap<Topic, Vec<Subscription>>,
    next_listener: u64,
    shut_down: bool,
}

/// Process-wide publish/subscribe registry for one simulation run.
///
/// Cloning yields another handle to the same registry. Creating the bus is its
/// init; [`EventBus::shutdown`] drops every subscription and turns later
/// publishes into no-ops.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("EventBus")
            .field("topics", &registry.topics.len())
            .field("shut_down", &registry.shut_down)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh listener identity.
    pub fn register_listener(&self) -> ListenerId {
        let mut registry = self.registry.lock();
        let id = ListenerId(registry.next_listener);
        registry.next_listener += 1;
        id
    }

    /// Subscribe `listener` to `topic`. Subscribing the same (topic, listener)
    /// pair twice keeps the first callback and returns `false`.
    pub fn subscribe<F>(&self, topic: Topic, listener: ListenerId, callback: F) -> bool
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        if registry.shut_down {
            warn!(?topic, ?listener, "subscribe after event bus shutdown ignored");
            return false;
        }
        let subscribers = registry.topics.entry(topic).or_default();
        if subscribers.iter().any(|s| s.listener == listener) {
            return false;
        }
        subscribers.push(Subscription {
            listener,
            callback: Arc::new(callback),
        });
        true
    }

    /// Remove one subscription. Returns `true` if it existed.
    pub fn unsubscribe(&self, topic: Topic, listener: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let Some(subscribers) = registry.topics.get_mut(&topic) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|s| s.listener != listener);
        before != subscribers.len()
    }

    /// Remove every subscription held by `listener`. Returns how many were removed.
    pub fn unsubscribe_all(&self, listener: ListenerId) -> usize {
        let mut registry = self.registry.lock();
        let mut removed = 0;
        for subscribers in registry.topics.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|s| s.listener != listener);
            removed += before - subscribers.len();
        }
        removed
    }

    /// Deliver `event` to every subscriber of its topic, in registration
    /// order, before returning. Listeners see a snapshot taken at the start of
    /// the publish, so they may subscribe, unsubscribe, or publish themselves.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        let snapshot: Vec<Callback> = {
            let registry = self.registry.lock();
            if registry.shut_down {
                warn!(?topic, "publish after event bus shutdown ignored");
                return;
            }
            registry
                .topics
                .get(&topic)
                .map(|subs| subs.iter().map(|s| Arc::clone(&s.callback)).collect())
                .unwrap_or_default()
        };

        trace!(?topic, listeners = snapshot.len(), "publish");
        for callback in snapshot {
            callback(&event);
        }
    }

    /// Number of subscriptions on a topic.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .lock()
            .topics
            .get(&topic)
            .map_or(0, |subs| subs.len())
    }

    /// Drop all subscriptions and refuse further traffic.
    pub fn shutdown(&self) {
        let mut registry = self.registry.lock();
        registry.topics.clear();
        registry.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.registry.lock().shut_down
    }
}
