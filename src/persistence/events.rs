//! Change notification for stored keys
//!
//! Every successful save or clear publishes a [`StorageChange`]. Several
//! store handles can share one bus (and one backend) to model several open
//! tabs: each sees the others' writes and can re-read. There is no locking;
//! the last writer wins.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A key's raw value before and after a write (`None` = absent)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageChange {
    /// Whether this change removed the key
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}

/// Handle returned by [`ChangeBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&StorageChange)>;

/// Single-threaded publish/subscribe channel for storage changes
#[derive(Default)]
pub struct ChangeBus {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every change
    pub fn subscribe(&self, listener: impl Fn(&StorageChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Register a listener for changes to one key
    pub fn subscribe_key(
        &self,
        key: impl Into<String>,
        listener: impl Fn(&StorageChange) + 'static,
    ) -> SubscriptionId {
        let key = key.into();
        self.subscribe(move |change| {
            if change.key == key {
                listener(change);
            }
        })
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver a change to every listener registered at call time
    pub fn publish(&self, change: &StorageChange) {
        // Snapshot so listeners may (un)subscribe while being notified
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        log::debug!(
            "Storage change on '{}' -> {} listener(s)",
            change.key,
            snapshot.len()
        );
        for listener in snapshot {
            listener(change);
        }
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
