//! Signal sources and observer seams
//!
//! The gate subscribes to two push feeds: connectivity probe verdicts and
//! application lifecycle transitions. Sources hold their subscribers weakly,
//! so dropping a gate stops delivery even without an explicit unsubscribe.

use std::sync::{Arc, Mutex, Weak};

use pharos_types::{ApplicationState, ConnectionState};

/// Receives probe verdicts pushed by a [`ConnectivitySource`].
pub trait ConnectivityObserver: Send + Sync {
    /// Called for every probe verdict, including repeats of the current one.
    fn on_connection_state_changed(&self, state: ConnectionState);
}

/// Receives lifecycle transitions pushed by a [`LifecycleSource`].
pub trait LifecycleObserver: Send + Sync {
    /// Called for every reported lifecycle transition.
    fn on_application_state_changed(&self, state: ApplicationState);
}

/// Push feed of connectivity probe verdicts.
pub trait ConnectivitySource: Send + Sync {
    /// Register an observer. The source never keeps it alive.
    fn subscribe(&self, observer: Weak<dyn ConnectivityObserver>) -> SubscriptionId;

    /// Drop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Push feed of application lifecycle transitions.
pub trait LifecycleSource: Send + Sync {
    /// Lifecycle state as of right now, for initial snapshots.
    fn current_state(&self) -> ApplicationState;

    /// Register an observer. The source never keeps it alive.
    fn subscribe(&self, observer: Weak<dyn LifecycleObserver>) -> SubscriptionId;

    /// Drop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Identifies one subscription for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered registry of weak subscribers.
///
/// Delivery order is subscription order. Entries whose subscriber has been
/// dropped are pruned on the next snapshot.
pub struct SubscriberSet<T: ?Sized> {
    inner: Mutex<SubscriberSetInner<T>>,
}

struct SubscriberSetInner<T: ?Sized> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Weak<T>)>,
}

impl<T: ?Sized> SubscriberSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SubscriberSetInner {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }

    /// Add a subscriber.
    pub fn insert(&self, subscriber: Weak<T>) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, subscriber));
        id
    }

    /// Remove a subscription. Returns whether it was present.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        inner.entries.len() != before
    }

    /// Upgrade all live subscribers in delivery order, pruning dropped ones.
    ///
    /// The internal lock is released before the caller invokes anyone, so
    /// observers may subscribe or unsubscribe from inside their callbacks.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.retain(|(_, weak)| weak.strong_count() > 0);
        inner
            .entries
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Whether no live subscriber remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for SubscriberSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
