use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::types::{PermissionKey, Role};

type Signal = Shared<oneshot::Receiver<bool>>;

/// Tracks the one outstanding remote check allowed per key.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    inner: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    pending: HashMap<PermissionKey, Entry>,
    next_id: u64,
}

struct Entry {
    id: u64,
    signal: Signal,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Outcome of [`InFlight::begin`].
#[derive(Debug)]
pub(crate) enum Ticket {
    /// The caller owns the round-trip for this key.
    Leader(Lease),
    /// Another caller already owns it.
    Waiter(Pending),
}

fn lock(inner: &Mutex<State>) -> MutexGuard<'_, State> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as checking, or attaches to the check already running.
    pub(crate) fn begin(&self, key: &PermissionKey) -> Ticket {
        let mut guard = lock(&self.inner);
        if let Some(entry) = guard.pending.get(key) {
            return Ticket::Waiter(Pending(entry.signal.clone()));
        }

        let (sender, receiver) = oneshot::channel();
        let id = guard.next_id;
        guard.next_id += 1;
        guard.pending.insert(
            key.clone(),
            Entry {
                id,
                signal: receiver.shared(),
            },
        );
        Ticket::Leader(Lease {
            key: key.clone(),
            id,
            inner: Arc::clone(&self.inner),
            sender: Some(sender),
        })
    }

    pub(crate) fn is_checking(&self, key: &PermissionKey) -> bool {
        lock(&self.inner).pending.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Forgets every marker. Running leaders still wake their own waiters.
    pub(crate) fn clear(&self) {
        lock(&self.inner).pending.clear();
    }

    pub(crate) fn clear_for_role(&self, role: &Role) {
        lock(&self.inner)
            .pending
            .retain(|key, _| key.role() != role);
    }
}

/// Ownership of one in-flight check.
///
/// Dropping the lease clears the checking marker on every path. Waiters
/// receive the leader's value only through [`Lease::finish`]; otherwise they
/// observe the check as abandoned.
#[derive(Debug)]
pub(crate) struct Lease {
    key: PermissionKey,
    id: u64,
    inner: Arc<Mutex<State>>,
    sender: Option<oneshot::Sender<bool>>,
}

impl Lease {
    /// Hands `value` to every waiter.
    pub(crate) fn finish(mut self, value: bool) {
        self.release();
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(value);
        }
    }

    fn release(&self) {
        let mut guard = lock(&self.inner);
        // A clear may have replaced the entry with a newer leader's.
        if guard
            .pending
            .get(&self.key)
            .is_some_and(|entry| entry.id == self.id)
        {
            guard.pending.remove(&self.key);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.release();
        }
    }
}

/// Handle to a check owned by another caller.
pub(crate) struct Pending(Signal);

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pending")
    }
}

impl Pending {
    /// Resolves to the owner's value, or `None` if it was abandoned.
    pub(crate) async fn wait(self) -> Option<bool> {
        self.0.await.ok()
    }
}
