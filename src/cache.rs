use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::observe::{CacheEvent, CacheListener, Listeners, Subscription};
use crate::permission::Permission;
use crate::types::{PermissionKey, Role};

/// Decision cache keyed by `(role, resource, action)`.
///
/// A missing entry means "never checked" and is distinct from a cached
/// `false`. Entries never expire; they are dropped only by [`clear`] or
/// [`clear_for_role`].
///
/// Clears advance a generation clock and stamp what they cleared: `clear`
/// stamps every role, `clear_for_role` only its role. Writers read the clock
/// before they start and use the `*_at` variants; a write is discarded when
/// its role was cleared after that read, so a result arriving after logout
/// cannot repopulate the cache and clearing one role never affects another.
///
/// [`clear`]: PermissionCache::clear
/// [`clear_for_role`]: PermissionCache::clear_for_role
#[derive(Debug, Default)]
pub struct PermissionCache {
    state: Mutex<CacheState>,
    listeners: Listeners,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PermissionKey, bool>,
    clock: u64,
    cleared_all_at: u64,
    role_cleared_at: HashMap<Role, u64>,
}

impl CacheState {
    fn is_current(&self, role: &Role, generation: u64) -> bool {
        let cleared_at = self
            .role_cleared_at
            .get(role)
            .copied()
            .unwrap_or_default()
            .max(self.cleared_all_at);
        cleared_at <= generation
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl PermissionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached decision, or `None` if the key was never resolved.
    pub fn get(&self, key: &PermissionKey) -> Option<bool> {
        self.lock().entries.get(key).copied()
    }

    /// Overwrites the decision for `key`.
    pub fn set(&self, key: PermissionKey, value: bool) {
        self.lock().entries.insert(key.clone(), value);
        self.listeners.emit(&CacheEvent::Set { key, value });
    }

    /// Writes `value` only if the key's role was not cleared since
    /// `generation` was read.
    pub(crate) fn set_at(&self, key: PermissionKey, value: bool, generation: u64) -> bool {
        {
            let mut guard = self.lock();
            if !guard.is_current(key.role(), generation) {
                return false;
            }
            guard.entries.insert(key.clone(), value);
        }
        self.listeners.emit(&CacheEvent::Set { key, value });
        true
    }

    /// Replaces every entry of `role` with `entries`, unless the role was
    /// cleared since `generation` was read.
    pub(crate) fn load_role_at(
        &self,
        role: &Role,
        entries: HashMap<Permission, bool>,
        generation: u64,
    ) -> bool {
        let count = entries.len();
        {
            let mut guard = self.lock();
            if !guard.is_current(role, generation) {
                return false;
            }
            guard.entries.retain(|key, _| key.role() != role);
            guard.entries.extend(
                entries
                    .into_iter()
                    .map(|(permission, allowed)| (permission.key_for(role), allowed)),
            );
        }
        self.listeners.emit(&CacheEvent::Loaded {
            role: role.clone(),
            count,
        });
        true
    }

    /// Removes every entry.
    pub fn clear(&self) {
        {
            let mut guard = self.lock();
            guard.entries.clear();
            guard.role_cleared_at.clear();
            guard.cleared_all_at = guard.tick();
        }
        self.listeners.emit(&CacheEvent::Cleared);
    }

    /// Removes the entries whose key starts with `role`.
    pub fn clear_for_role(&self, role: &Role) {
        {
            let mut guard = self.lock();
            guard.entries.retain(|key, _| key.role() != role);
            let cleared_at = guard.tick();
            guard.role_cleared_at.insert(role.clone(), cleared_at);
        }
        self.listeners
            .emit(&CacheEvent::RoleCleared { role: role.clone() });
    }

    /// Returns the current generation; read it before starting a write.
    pub fn generation(&self) -> u64 {
        self.lock().clock
    }

    /// Returns the number of cached decisions.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns true when at least one decision is cached for `role`.
    pub fn contains_role(&self, role: &Role) -> bool {
        self.lock().entries.keys().any(|key| key.role() == role)
    }

    /// Registers a listener for cache mutations.
    pub fn subscribe(&self, listener: Arc<dyn CacheListener>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}
