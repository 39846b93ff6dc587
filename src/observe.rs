//! Cache-change notifications.
//!
//! Anything that derives state from cached decisions (menus, button states)
//! subscribes here instead of polling the cache.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::types::{PermissionKey, Role};

/// Change applied to the permission cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A single decision was written.
    Set { key: PermissionKey, value: bool },
    /// A role's decisions were bulk loaded.
    Loaded { role: Role, count: usize },
    /// A role's decisions were removed.
    RoleCleared { role: Role },
    /// Every decision was removed.
    Cleared,
}

/// Receiver of [`CacheEvent`]s.
pub trait CacheListener: Send + Sync {
    /// Called after the cache has been mutated.
    fn on_event(&self, event: &CacheEvent);
}

impl<F> CacheListener for F
where
    F: Fn(&CacheEvent) + Send + Sync,
{
    fn on_event(&self, event: &CacheEvent) {
        self(event)
    }
}

type Entries = Vec<(u64, Arc<dyn CacheListener>)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Entries,
}

/// Listener registry owned by the cache.
#[derive(Default, Clone)]
pub(crate) struct Listeners {
    inner: Arc<Mutex<Registry>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, listener: Arc<dyn CacheListener>) -> Subscription {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push((id, listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `event` to every listener. Must not be called with the cache lock held.
    pub(crate) fn emit(&self, event: &CacheEvent) {
        let listeners: Vec<Arc<dyn CacheListener>> = {
            let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard
                .entries
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener.on_event(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

/// Active listener registration; unsubscribes when dropped.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut guard = registry.lock().unwrap_or_else(PoisonError::into_inner);
            guard.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_should_reach_subscribers_until_dropped() {
        let listeners = Listeners::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let subscription = listeners.subscribe(Arc::new(move |_: &CacheEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.emit(&CacheEvent::Cleared);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        drop(subscription);
        assert_eq!(listeners.len(), 0);
        listeners.emit(&CacheEvent::Cleared);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
