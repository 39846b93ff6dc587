use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, trace, warn};

use crate::api::PermissionApi;
use crate::cache::PermissionCache;
use crate::error::{Error, Result};
use crate::inflight::{InFlight, Ticket};
use crate::observe::{CacheListener, Subscription};
use crate::permission::Permission;
use crate::session::Session;
use crate::types::{AUDITOR, DEV, Role, SEC_MGR, SUPER_ADMIN};

/// Client-side permission evaluator.
///
/// Mirrors server decisions in a [`PermissionCache`], collapses concurrent
/// checks of the same key into one remote call, and follows the identity in
/// its [`Session`]. Read paths never fail: remote errors degrade to the
/// caller's fallback and are cached so they are not retried until the cache
/// is cleared.
#[derive(Debug)]
pub struct Evaluator<A> {
    api: A,
    session: Arc<Session>,
    cache: PermissionCache,
    inflight: InFlight,
    bypass_role: Role,
    default_fallback: bool,
}

/// Builder for [`Evaluator`].
pub struct EvaluatorBuilder<A> {
    api: A,
    session: Option<Arc<Session>>,
    bypass_role: Role,
    default_fallback: bool,
}

impl<A> EvaluatorBuilder<A> {
    /// Creates a new builder with default configuration.
    pub fn new(api: A) -> Self {
        Self {
            api,
            session: None,
            bypass_role: Role::super_admin(),
            default_fallback: false,
        }
    }

    /// Binds the evaluator to an existing session.
    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the role that passes every check without cache or network.
    pub fn bypass_role(mut self, role: Role) -> Self {
        self.bypass_role = role;
        self
    }

    /// Sets the fallback used by batch checks and preloading.
    pub fn default_fallback(mut self, fallback: bool) -> Self {
        self.default_fallback = fallback;
        self
    }

    /// Builds the evaluator.
    pub fn build(self) -> Evaluator<A> {
        Evaluator {
            api: self.api,
            session: self.session.unwrap_or_default(),
            cache: PermissionCache::new(),
            inflight: InFlight::new(),
            bypass_role: self.bypass_role,
            default_fallback: self.default_fallback,
        }
    }
}

impl<A> Evaluator<A> {
    /// Returns the bound session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Returns the decision cache.
    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Returns the fallback used by batch checks and preloading.
    pub fn default_fallback(&self) -> bool {
        self.default_fallback
    }

    /// Returns the current role.
    pub fn current_role(&self) -> Option<Role> {
        self.session.role()
    }

    /// Returns whether the current role is the bypass role.
    pub fn is_bypass(&self) -> bool {
        self.session.has_role(self.bypass_role.as_str())
    }

    /// Returns whether the current role is `super_admin`.
    pub fn is_admin(&self) -> bool {
        self.session.has_role(SUPER_ADMIN)
    }

    /// Returns whether the current role is `sec_mgr`.
    pub fn is_security_manager(&self) -> bool {
        self.session.has_role(SEC_MGR)
    }

    /// Returns whether the current role is `dev`.
    pub fn is_developer(&self) -> bool {
        self.session.has_role(DEV)
    }

    /// Returns whether the current role is `auditor`.
    pub fn is_auditor(&self) -> bool {
        self.session.has_role(AUDITOR)
    }

    /// Returns whether the current role is `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.session.has_role(role)
    }

    /// Returns whether the current role is one of `roles`.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.session
            .role()
            .is_some_and(|current| roles.contains(&current))
    }

    /// Cache-only check; never suspends and never touches the network.
    pub fn check_sync(&self, permission: &Permission, fallback: bool) -> bool {
        let Some(role) = self.session.role() else {
            return false;
        };
        if role == self.bypass_role {
            return true;
        }
        self.cache
            .get(&permission.key_for(&role))
            .unwrap_or(fallback)
    }

    /// Returns whether a decision is cached for the current role.
    pub fn is_cached(&self, permission: &Permission) -> bool {
        self.session
            .role()
            .is_some_and(|role| self.cache.get(&permission.key_for(&role)).is_some())
    }

    /// Returns whether a remote check is outstanding for the current role.
    pub fn is_checking(&self, permission: &Permission) -> bool {
        self.session
            .role()
            .is_some_and(|role| self.inflight.is_checking(&permission.key_for(&role)))
    }

    /// Drops every cached decision and in-flight marker.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.inflight.clear();
    }

    /// Drops the cached decisions and in-flight markers of `role`.
    pub fn clear_role_cache(&self, role: &Role) {
        self.cache.clear_for_role(role);
        self.inflight.clear_for_role(role);
    }

    /// Registers a listener for cache changes.
    pub fn subscribe(&self, listener: Arc<dyn CacheListener>) -> Subscription {
        self.cache.subscribe(listener)
    }

    /// Unbinds the session and drops all cached state.
    pub fn logout(&self) {
        let previous = self.session.replace(None);
        self.clear_cache();
        if let Some(role) = previous {
            info!(role = %role, "session logged out; permission cache cleared");
        }
    }
}

impl<A> Evaluator<A>
where
    A: PermissionApi,
{
    /// Checks a permission, asking the server on a cache miss.
    ///
    /// Concurrent calls for the same key share one remote round-trip and its
    /// answer. A failed check resolves to `fallback` and caches it.
    pub async fn check_async(&self, permission: &Permission, fallback: bool) -> bool {
        // Read before the role so a logout in between stales this check.
        let generation = self.cache.generation();
        let Some(role) = self.session.role() else {
            return false;
        };
        if role == self.bypass_role {
            return true;
        }

        let key = permission.key_for(&role);
        if let Some(cached) = self.cache.get(&key) {
            trace!(key = %key, allowed = cached, "permission cache hit");
            return cached;
        }

        let lease = match self.inflight.begin(&key) {
            Ticket::Leader(lease) => lease,
            Ticket::Waiter(pending) => {
                debug!(key = %key, "waiting on in-flight permission check");
                return match pending.wait().await {
                    Some(allowed) => allowed,
                    None => {
                        debug!(key = %key, "in-flight permission check was abandoned");
                        self.cache.get(&key).unwrap_or(fallback)
                    }
                };
            }
        };

        if let Some(cached) = self.cache.get(&key) {
            lease.finish(cached);
            return cached;
        }

        let allowed = match self
            .api
            .check_permission(&role, permission.resource(), permission.action())
            .await
        {
            Ok(allowed) => allowed,
            Err(error) => {
                warn!(key = %key, error = %error, fallback, "permission check failed");
                fallback
            }
        };

        let resolved = if self.cache.set_at(key.clone(), allowed, generation) {
            allowed
        } else if self.session.role().as_ref() == Some(&role) {
            debug!(key = %key, "role cache cleared during permission check; result not cached");
            allowed
        } else {
            debug!(key = %key, "session changed during permission check; result discarded");
            fallback
        };
        lease.finish(resolved);
        resolved
    }

    /// Checks every permission concurrently.
    ///
    /// One failed check does not affect the others; each resolves to the
    /// default fallback on its own.
    pub async fn check_batch(&self, permissions: &[Permission]) -> HashMap<Permission, bool> {
        let checks = permissions.iter().map(|permission| async move {
            let allowed = self.check_async(permission, self.default_fallback).await;
            (permission.clone(), allowed)
        });
        join_all(checks).await.into_iter().collect()
    }

    /// Warms the cache, skipping permissions already cached or in flight.
    pub async fn preload(&self, permissions: &[Permission]) {
        let Some(role) = self.session.role() else {
            return;
        };
        if role == self.bypass_role {
            return;
        }

        let missing: Vec<Permission> = permissions
            .iter()
            .filter(|permission| {
                let key = permission.key_for(&role);
                self.cache.get(&key).is_none() && !self.inflight.is_checking(&key)
            })
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }

        debug!(role = %role, count = missing.len(), "preloading permissions");
        self.check_batch(&missing).await;
    }

    /// Loads every decision of the current role in one call.
    ///
    /// Returns the number of cached entries, which is zero when a clear raced
    /// the fetch and the result was discarded. On failure the role's entries
    /// are cleared so the cache never mixes fetched and default values.
    pub async fn initialize_from_server(&self) -> Result<usize> {
        let generation = self.cache.generation();
        let role = self.session.role().ok_or(Error::Unauthenticated)?;
        if role == self.bypass_role {
            return Ok(0);
        }

        match self.fetch_role_permissions(&role).await {
            Ok(entries) => {
                let count = entries.len();
                if self.cache.load_role_at(&role, entries, generation) {
                    debug!(role = %role, count, "permission cache initialized");
                    Ok(count)
                } else {
                    debug!(role = %role, "cache cleared during initialization; result discarded");
                    Ok(0)
                }
            }
            Err(error) => {
                warn!(role = %role, error = %error, "permission initialization failed");
                self.clear_role_cache(&role);
                Err(error)
            }
        }
    }

    async fn fetch_role_permissions(&self, role: &Role) -> Result<HashMap<Permission, bool>> {
        let raw = self.api.user_permissions(role).await?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, allowed) in raw {
            let permission =
                Permission::parse(&key).map_err(|_| Error::InvalidServerKey(key.clone()))?;
            entries.insert(permission, allowed);
        }
        Ok(entries)
    }

    /// Initializes from the server unless the current role already has cached decisions.
    pub async fn ensure_initialized(&self) -> Result<usize> {
        let role = self.session.role().ok_or(Error::Unauthenticated)?;
        if role == self.bypass_role || self.cache.contains_role(&role) {
            return Ok(0);
        }
        self.initialize_from_server().await
    }

    /// Binds `role` to the session and loads its decisions.
    pub async fn login(&self, role: Role) -> Result<usize> {
        self.session.replace(Some(role.clone()));
        self.clear_cache();
        info!(role = %role, "session logged in");
        self.initialize_from_server().await
    }

    /// Switches the session to `role`, discarding everything learned before.
    pub async fn change_role(&self, role: Role) -> Result<usize> {
        let previous = self.session.replace(Some(role.clone()));
        self.clear_cache();
        info!(
            from = ?previous,
            to = %role,
            "session role changed"
        );
        self.initialize_from_server().await
    }

    /// Asks the server to reload its policy, then forgets the current role's decisions.
    pub async fn reload_policy(&self) -> Result<()> {
        self.api.reload_policy().await?;
        if let Some(role) = self.session.role() {
            self.clear_role_cache(&role);
            info!(role = %role, "policy reloaded; role permissions will be re-learned");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_api::MemoryApi;
    use futures::executor::block_on;

    fn role(value: &str) -> Role {
        Role::try_from(value).unwrap()
    }

    fn perm(value: &str) -> Permission {
        Permission::parse(value).unwrap()
    }

    fn evaluator_for(api: MemoryApi, value: &str) -> Evaluator<MemoryApi> {
        EvaluatorBuilder::new(api)
            .session(Arc::new(Session::with_role(role(value))))
            .build()
    }

    #[test]
    fn check_should_deny_without_session() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = EvaluatorBuilder::new(api.clone()).build();

        assert!(!block_on(evaluator.check_async(&perm("secret:read"), true)));
        assert!(!evaluator.check_sync(&perm("secret:read"), true));
        assert_eq!(api.check_calls(), 0);
    }

    #[test]
    fn bypass_role_should_allow_without_cache_or_network() {
        let api = MemoryApi::new();
        api.fail_checks(true);
        let evaluator = evaluator_for(api.clone(), "super_admin");

        assert!(block_on(evaluator.check_async(&perm("anything:anything"), false)));
        assert!(evaluator.check_sync(&perm("anything:anything"), false));
        assert!(evaluator.cache().is_empty());
        assert_eq!(api.check_calls(), 0);
    }

    #[test]
    fn custom_bypass_role_should_replace_super_admin() {
        let api = MemoryApi::new();
        let evaluator = EvaluatorBuilder::new(api.clone())
            .session(Arc::new(Session::with_role(role("root"))))
            .bypass_role(role("root"))
            .build();

        assert!(block_on(evaluator.check_async(&perm("secret:delete"), false)));
        assert!(evaluator.is_bypass());
        assert!(!evaluator.is_admin());
    }

    #[test]
    fn denied_check_should_be_cached() {
        let api = MemoryApi::new();
        let evaluator = evaluator_for(api.clone(), "dev");
        let create = perm("secret:create");

        assert!(!block_on(evaluator.check_async(&create, false)));
        assert_eq!(api.check_calls(), 1);
        assert!(evaluator.is_cached(&create));

        assert!(!evaluator.check_sync(&create, true));
        assert!(!block_on(evaluator.check_async(&create, true)));
        assert_eq!(api.check_calls(), 1);
    }

    #[test]
    fn check_sync_should_use_fallback_on_miss() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");

        assert!(evaluator.check_sync(&perm("secret:read"), true));
        assert!(!evaluator.check_sync(&perm("secret:read"), false));
        assert_eq!(api.check_calls(), 0);
    }

    #[test]
    fn cache_set_should_answer_sync_check() {
        let api = MemoryApi::new();
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        evaluator.cache().set(read.key_for(&role("dev")), true);

        assert!(evaluator.check_sync(&read, false));
        assert_eq!(api.check_calls(), 0);
    }

    #[test]
    fn failed_check_should_cache_fallback() {
        let api = MemoryApi::new();
        api.fail_checks(true);
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");

        assert!(block_on(evaluator.check_async(&read, true)));
        assert!(block_on(evaluator.check_async(&read, false)));
        assert!(evaluator.check_sync(&read, false));
        assert_eq!(api.check_calls(), 1);
        assert!(!evaluator.is_checking(&read));
    }

    #[test]
    fn concurrent_checks_should_share_one_request() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();

        let (first, second, ()) = block_on(async {
            futures::join!(
                evaluator.check_async(&read, false),
                evaluator.check_async(&read, false),
                async move { paused.resume() },
            )
        });

        assert!(first);
        assert!(second);
        assert_eq!(api.check_calls(), 1);
    }

    #[test]
    fn waiter_should_read_leader_fallback_after_failure() {
        let api = MemoryApi::new();
        api.fail_checks(true);
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();

        let (leader, waiter, ()) = block_on(async {
            futures::join!(
                evaluator.check_async(&read, false),
                evaluator.check_async(&read, true),
                async move { paused.resume() },
            )
        });

        assert!(!leader);
        assert!(!waiter);
        assert_eq!(api.check_calls(), 1);
    }

    #[test]
    fn dropped_leader_should_clear_checking_state() {
        let api = MemoryApi::new();
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();

        let mut leader = Box::pin(evaluator.check_async(&read, false));
        assert!(block_on(async { futures::poll!(leader.as_mut()) }).is_pending());
        assert!(evaluator.is_checking(&read));

        drop(leader);
        drop(paused);

        assert!(!evaluator.is_checking(&read));
        assert!(!evaluator.is_cached(&read));
    }

    #[test]
    fn logout_during_check_should_leave_cache_empty() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();
        let evaluator_ref = &evaluator;

        let (allowed, ()) = block_on(async {
            futures::join!(evaluator.check_async(&read, false), async move {
                evaluator_ref.logout();
                paused.resume();
            })
        });

        assert!(!allowed);
        assert!(evaluator.cache().is_empty());
    }

    #[test]
    fn clearing_another_role_should_not_split_waiters() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();
        let evaluator_ref = &evaluator;

        let (leader, waiter, ()) = block_on(async {
            futures::join!(
                evaluator.check_async(&read, false),
                evaluator.check_async(&read, false),
                async move {
                    evaluator_ref.clear_role_cache(&role("auditor"));
                    paused.resume();
                },
            )
        });

        assert!(leader);
        assert_eq!(leader, waiter);
        assert_eq!(api.check_calls(), 1);
        assert_eq!(evaluator.cache().get(&read.key_for(&role("dev"))), Some(true));
    }

    #[test]
    fn clearing_own_role_mid_check_should_share_uncached_result() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();
        let evaluator_ref = &evaluator;

        let (leader, waiter, ()) = block_on(async {
            futures::join!(
                evaluator.check_async(&read, false),
                evaluator.check_async(&read, true),
                async move {
                    evaluator_ref.clear_role_cache(&role("dev"));
                    paused.resume();
                },
            )
        });

        assert!(leader);
        assert!(waiter);
        assert!(!evaluator.is_cached(&read));
    }

    #[test]
    fn relogin_of_same_role_mid_check_should_not_repopulate_cache() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();
        let evaluator_ref = &evaluator;

        let (allowed, ()) = block_on(async {
            futures::join!(evaluator.check_async(&read, false), async move {
                evaluator_ref.logout();
                evaluator_ref.session().replace(Some(role("dev")));
                paused.resume();
            })
        });

        assert!(allowed);
        assert!(evaluator.cache().is_empty());
    }

    #[test]
    fn initialize_discarded_by_clear_should_report_nothing_loaded() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");
        let paused = api.pause();
        let evaluator_ref = &evaluator;

        let (loaded, ()) = block_on(async {
            futures::join!(evaluator.initialize_from_server(), async move {
                evaluator_ref.clear_cache();
                paused.resume();
            })
        });

        assert_eq!(loaded.unwrap(), 0);
        assert!(evaluator.cache().is_empty());
    }

    #[test]
    fn batch_should_return_every_pair() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");

        let results = block_on(evaluator.check_batch(&[perm("secret:read"), perm("user:create")]));

        assert_eq!(results.len(), 2);
        assert_eq!(results.get(&perm("secret:read")), Some(&true));
        assert_eq!(results.get(&perm("user:create")), Some(&false));
    }

    #[test]
    fn preload_should_skip_cached_pairs() {
        let api = MemoryApi::new();
        let evaluator = evaluator_for(api.clone(), "dev");
        block_on(evaluator.check_async(&perm("secret:read"), false));
        assert_eq!(api.check_calls(), 1);

        block_on(evaluator.preload(&[perm("secret:read"), perm("secret:update")]));
        assert_eq!(api.check_calls(), 2);

        block_on(evaluator.preload(&[perm("secret:read"), perm("secret:update")]));
        assert_eq!(api.check_calls(), 2);
    }

    #[test]
    fn preload_should_skip_pairs_in_flight() {
        let api = MemoryApi::new();
        let evaluator = evaluator_for(api.clone(), "dev");
        let read = perm("secret:read");
        let paused = api.pause();

        let mut leader = Box::pin(evaluator.check_async(&read, false));
        assert!(block_on(async { futures::poll!(leader.as_mut()) }).is_pending());
        block_on(evaluator.preload(std::slice::from_ref(&read)));
        assert_eq!(api.check_calls(), 1);

        paused.resume();
        assert!(!block_on(leader));
        assert_eq!(api.check_calls(), 1);
    }

    #[test]
    fn initialize_should_populate_role_entries() {
        let api = MemoryApi::new();
        api.insert_raw(role("dev"), "secret:read", true);
        api.insert_raw(role("dev"), "user:create", false);
        let evaluator = evaluator_for(api.clone(), "dev");

        let count = block_on(evaluator.initialize_from_server()).unwrap();

        assert_eq!(count, 2);
        assert_eq!(evaluator.cache().len(), 2);
        assert!(evaluator.check_sync(&perm("secret:read"), false));
        assert!(!evaluator.check_sync(&perm("user:create"), true));
        assert_eq!(api.check_calls(), 0);
    }

    #[test]
    fn initialize_failure_should_clear_role_entries() {
        let api = MemoryApi::new();
        api.fail_bulk(true);
        let evaluator = evaluator_for(api.clone(), "dev");
        evaluator.cache().set(perm("secret:read").key_for(&role("dev")), true);
        evaluator
            .cache()
            .set(perm("audit:read").key_for(&role("auditor")), true);

        let result = block_on(evaluator.initialize_from_server());

        assert!(matches!(result, Err(Error::Api(_))));
        assert!(!evaluator.cache().contains_role(&role("dev")));
        assert!(evaluator.cache().contains_role(&role("auditor")));
    }

    #[test]
    fn initialize_should_reject_malformed_server_keys() {
        let api = MemoryApi::new();
        api.insert_raw(role("dev"), "secret:read", true);
        api.insert_raw(role("dev"), "not-a-permission", true);
        let evaluator = evaluator_for(api, "dev");

        let result = block_on(evaluator.initialize_from_server());

        assert!(matches!(result, Err(Error::InvalidServerKey(_))));
        assert!(evaluator.cache().is_empty());
    }

    #[test]
    fn login_and_logout_should_follow_identity() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        api.grant(role("auditor"), &perm("audit:read"));
        let evaluator = EvaluatorBuilder::new(api.clone()).build();

        block_on(evaluator.login(role("dev"))).unwrap();
        assert!(evaluator.is_developer());
        assert!(evaluator.check_sync(&perm("secret:read"), false));

        block_on(evaluator.change_role(role("auditor"))).unwrap();
        assert!(evaluator.is_auditor());
        assert!(!evaluator.cache().contains_role(&role("dev")));
        assert!(evaluator.check_sync(&perm("audit:read"), false));

        evaluator.logout();
        assert!(evaluator.cache().is_empty());
        assert!(!evaluator.check_sync(&perm("audit:read"), true));
    }

    #[test]
    fn ensure_initialized_should_load_once() {
        let api = MemoryApi::new();
        api.grant(role("dev"), &perm("secret:read"));
        let evaluator = evaluator_for(api.clone(), "dev");

        assert_eq!(block_on(evaluator.ensure_initialized()).unwrap(), 1);
        assert_eq!(block_on(evaluator.ensure_initialized()).unwrap(), 0);
        assert_eq!(api.bulk_calls(), 1);
    }

    #[test]
    fn reload_policy_should_clear_current_role_only() {
        let api = MemoryApi::new();
        let evaluator = evaluator_for(api.clone(), "dev");
        evaluator.cache().set(perm("secret:read").key_for(&role("dev")), true);
        evaluator
            .cache()
            .set(perm("audit:read").key_for(&role("auditor")), true);

        block_on(evaluator.reload_policy()).unwrap();

        assert_eq!(api.reload_calls(), 1);
        assert!(!evaluator.cache().contains_role(&role("dev")));
        assert!(evaluator.cache().contains_role(&role("auditor")));
    }

    #[test]
    fn reload_policy_failure_should_propagate_and_keep_cache() {
        let api = MemoryApi::new();
        api.fail_reload(true);
        let evaluator = evaluator_for(api, "dev");
        evaluator.cache().set(perm("secret:read").key_for(&role("dev")), true);

        let result = block_on(evaluator.reload_policy());

        assert!(matches!(result, Err(Error::Api(_))));
        assert_eq!(evaluator.cache().len(), 1);
    }

    #[test]
    fn has_any_role_should_match_listed_roles() {
        let evaluator = evaluator_for(MemoryApi::new(), "sec_mgr");

        assert!(evaluator.is_security_manager());
        assert!(evaluator.has_any_role(&[role("super_admin"), role("sec_mgr")]));
        assert!(!evaluator.has_any_role(&[role("auditor")]));
    }
}
