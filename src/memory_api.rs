use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::api::PermissionApi;
use crate::error::ApiError;
use crate::permission::Permission;
use crate::types::{Action, ResourceName, Role};

/// In-memory permission API for tests and demos.
///
/// Clones share state, so a test can keep a handle for assertions while the
/// evaluator owns another.
#[derive(Debug, Default, Clone)]
pub struct MemoryApi {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    grants: RwLock<HashMap<Role, HashMap<String, bool>>>,
    fail_checks: AtomicBool,
    fail_bulk: AtomicBool,
    fail_reload: AtomicBool,
    check_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
    reload_calls: AtomicUsize,
    gate: Mutex<Option<Gate>>,
}

struct Gate(Shared<oneshot::Receiver<()>>);

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Gate")
    }
}

/// Holds remote calls until dropped or [`resume`](Paused::resume)d.
#[derive(Debug)]
#[must_use = "checks resume as soon as the handle is dropped"]
pub struct Paused {
    api: MemoryApi,
    sender: Option<oneshot::Sender<()>>,
}

impl Paused {
    /// Lets held checks complete.
    pub fn resume(self) {}
}

impl Drop for Paused {
    fn drop(&mut self) {
        self.api
            .inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(());
        }
    }
}

impl MemoryApi {
    /// Creates an API that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision for `role` on `permission`.
    pub fn set(&self, role: Role, permission: &Permission, allowed: bool) {
        self.insert_raw(role, permission.to_string(), allowed);
    }

    /// Grants `permission` to `role`.
    pub fn grant(&self, role: Role, permission: &Permission) {
        self.set(role, permission, true);
    }

    /// Records a decision under an arbitrary bulk-map key.
    pub fn insert_raw(&self, role: Role, key: impl Into<String>, allowed: bool) {
        let mut guard = self
            .inner
            .grants
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(role).or_default().insert(key.into(), allowed);
    }

    /// Makes single checks fail.
    pub fn fail_checks(&self, on: bool) {
        self.inner.fail_checks.store(on, Ordering::SeqCst);
    }

    /// Makes bulk permission fetches fail.
    pub fn fail_bulk(&self, on: bool) {
        self.inner.fail_bulk.store(on, Ordering::SeqCst);
    }

    /// Makes policy reloads fail.
    pub fn fail_reload(&self, on: bool) {
        self.inner.fail_reload.store(on, Ordering::SeqCst);
    }

    /// Number of single checks received.
    pub fn check_calls(&self) -> usize {
        self.inner.check_calls.load(Ordering::SeqCst)
    }

    /// Number of bulk fetches received.
    pub fn bulk_calls(&self) -> usize {
        self.inner.bulk_calls.load(Ordering::SeqCst)
    }

    /// Number of policy reloads received.
    pub fn reload_calls(&self) -> usize {
        self.inner.reload_calls.load(Ordering::SeqCst)
    }

    /// Holds every check and bulk fetch issued from now on until the handle is released.
    pub fn pause(&self) -> Paused {
        let (sender, receiver) = oneshot::channel();
        *self
            .inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Gate(receiver.shared()));
        Paused {
            api: self.clone(),
            sender: Some(sender),
        }
    }

    fn gate(&self) -> Option<Shared<oneshot::Receiver<()>>> {
        self.inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|gate| gate.0.clone())
    }
}

#[async_trait]
impl PermissionApi for MemoryApi {
    async fn check_permission(
        &self,
        role: &Role,
        resource: &ResourceName,
        action: &Action,
    ) -> std::result::Result<bool, ApiError> {
        self.inner.check_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate() {
            let _ = gate.await;
        }
        if self.inner.fail_checks.load(Ordering::SeqCst) {
            return Err("permission check unavailable".into());
        }
        let key = format!("{resource}:{action}");
        let guard = self
            .inner
            .grants
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get(role)
            .and_then(|perms| perms.get(&key).copied())
            .unwrap_or(false))
    }

    async fn user_permissions(
        &self,
        role: &Role,
    ) -> std::result::Result<HashMap<String, bool>, ApiError> {
        self.inner.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate() {
            let _ = gate.await;
        }
        if self.inner.fail_bulk.load(Ordering::SeqCst) {
            return Err("permission listing unavailable".into());
        }
        let guard = self
            .inner
            .grants
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(role).cloned().unwrap_or_default())
    }

    async fn reload_policy(&self) -> std::result::Result<(), ApiError> {
        self.inner.reload_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_reload.load(Ordering::SeqCst) {
            return Err("policy reload rejected".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn memory_api_should_support_basic_flow() {
        let api = MemoryApi::new();
        let role = Role::try_from("dev").unwrap();
        let read = Permission::parse("secret:read").unwrap();
        api.grant(role.clone(), &read);

        let allowed =
            block_on(api.check_permission(&role, read.resource(), read.action())).unwrap();
        let all = block_on(api.user_permissions(&role)).unwrap();

        assert!(allowed);
        assert_eq!(all.get("secret:read"), Some(&true));
        assert_eq!(api.check_calls(), 1);
        assert_eq!(api.bulk_calls(), 1);
    }

    #[test]
    fn unknown_permission_should_be_denied() {
        let api = MemoryApi::new();
        let role = Role::try_from("dev").unwrap();
        let create = Permission::parse("secret:create").unwrap();

        let allowed =
            block_on(api.check_permission(&role, create.resource(), create.action())).unwrap();

        assert!(!allowed);
    }
}
