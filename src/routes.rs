//! Route table, menu filtering and navigation guarding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::api::PermissionApi;
use crate::error::Error;
use crate::gating::Gate;
use crate::observe::{CacheEvent, Subscription};
use crate::permission::Permission;
use crate::types::{AUDITOR, Action, ResourceName, Role, SEC_MGR, SUPER_ADMIN};

/// Menu position used when a route does not set one.
pub const DEFAULT_MENU_ORDER: u32 = 999;
/// Where signed-out users are sent.
pub const LOGIN_PATH: &str = "/login";
/// Where signed-in users land.
pub const HOME_PATH: &str = "/dashboard";

/// Menu metadata of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MenuMeta {
    pub title: String,
    pub icon: Option<String>,
    pub order: Option<u32>,
    pub show_in_menu: bool,
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    /// Path pattern; `:name` segments match any value.
    pub path: String,
    pub name: String,
    pub requires_auth: bool,
    /// Coarse allow-list; `None` admits every role.
    pub roles: Option<Vec<Role>>,
    pub menu: Option<MenuMeta>,
}

impl Route {
    /// Creates an authenticated route without role restriction or menu entry.
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            requires_auth: true,
            roles: None,
            menu: None,
        }
    }

    /// Marks the route as reachable without a session.
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Restricts the route to `roles`.
    pub fn roles(mut self, roles: &[&str]) -> Self {
        self.roles = Some(
            roles
                .iter()
                .map(|role| Role::from_string((*role).to_string()))
                .collect(),
        );
        self
    }

    /// Adds a visible menu entry.
    pub fn menu(mut self, title: &str, icon: &str, order: Option<u32>) -> Self {
        self.menu = Some(MenuMeta {
            title: title.to_string(),
            icon: Some(icon.to_string()),
            order,
            show_in_menu: true,
        });
        self
    }

    /// Hides the menu entry while keeping its metadata.
    pub fn hidden_from_menu(mut self) -> Self {
        if let Some(menu) = self.menu.as_mut() {
            menu.show_in_menu = false;
        }
        self
    }

    /// Returns whether `path` matches this route's pattern.
    pub fn matches(&self, path: &str) -> bool {
        let mut pattern = self.path.trim_end_matches('/').split('/');
        let mut actual = path.trim_end_matches('/').split('/');
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return true,
                (Some(expected), Some(segment)) => {
                    if expected.starts_with(':') {
                        if segment.is_empty() {
                            return false;
                        }
                    } else if expected != segment {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Returns whether `role` passes the coarse allow-list.
    pub fn admits(&self, role: &Role) -> bool {
        self.roles
            .as_ref()
            .is_none_or(|allowed| allowed.contains(role))
    }
}

/// Visible menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MenuItem {
    pub path: String,
    pub title: String,
    pub icon: Option<String>,
    pub order: u32,
}

/// Static routes plus the permission each path requires.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    permissions: HashMap<String, Permission>,
}

fn trusted(resource: &str, action: &str) -> Permission {
    Permission::from_parts(
        ResourceName::from_string(resource.to_string()),
        Action::from_string(action.to_string()),
    )
}

const SECRET_PAGES: [(&str, &str, &str, &str, Option<u32>); 6] = [
    ("/api_key", "ApiKey", "API Keys", "key-round", None),
    ("/access_key", "AccessKey", "Access Keys", "key-square", Some(3)),
    ("/ssh_key", "SshKey", "SSH Keys", "terminal", Some(4)),
    ("/password", "Password", "Passwords", "lock", Some(5)),
    ("/token", "Token", "Tokens", "ticket", Some(7)),
    ("/custom", "Custom", "Custom Secrets", "braces", Some(11)),
];

const SECRET_PATH_MARKERS: [&str; 7] = [
    "api_key",
    "access_key",
    "ssh_key",
    "password",
    "certificate",
    "token",
    "custom",
];

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Requires `permission` to see `path`.
    pub fn require(mut self, path: impl Into<String>, permission: Permission) -> Self {
        self.permissions.insert(path.into(), permission);
        self
    }

    /// Built-in table of the secrets console.
    pub fn console() -> Self {
        let mut table = Self::new()
            .route(Route::new("/dashboard", "Dashboard").menu(
                "Dashboard",
                "layout-dashboard",
                Some(1),
            ))
            .route(
                Route::new("/users", "UserList")
                    .roles(&[SUPER_ADMIN, SEC_MGR])
                    .menu("Users", "users", Some(1)),
            )
            .route(
                Route::new("/policy", "PermissionManagement")
                    .roles(&[SUPER_ADMIN, SEC_MGR])
                    .menu("Roles & Permissions", "shield", Some(3)),
            )
            .route(
                Route::new("/audit", "Audit")
                    .roles(&[SUPER_ADMIN, SEC_MGR, AUDITOR])
                    .menu("Audit Logs", "file-text", None),
            )
            .route(Route::new("/access_requests", "AccessRequests").menu(
                "Access Requests",
                "user-check",
                Some(4),
            ))
            .route(Route::new("/notifications", "Notifications").menu(
                "Notifications",
                "bell",
                Some(5),
            ));

        for (path, name, title, icon, order) in SECRET_PAGES {
            table = table
                .route(Route::new(path, format!("{name}List")).menu(title, icon, order))
                .route(Route::new(format!("{path}/create"), format!("{name}Create")))
                .route(Route::new(format!("{path}/:id"), format!("{name}Detail")))
                .route(Route::new(format!("{path}/:id/edit"), format!("{name}Edit")))
                .require(path, trusted("secret", "read"));
        }

        table
            .route(
                Route::new("/profile", "Profile")
                    .menu("Profile", "settings", Some(5))
                    .hidden_from_menu(),
            )
            .route(Route::new(LOGIN_PATH, "Login").public())
            .require("/dashboard", trusted("dashboard", "read"))
            .require("/users", trusted("user", "read"))
            .require("/audit", trusted("audit", "read"))
            .require("/policy", trusted("policy", "read"))
            .require("/certificate", trusted("secret", "read"))
    }

    /// Returns every route in declaration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the first route matching `path`.
    pub fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Returns the permission required for `path`, if any.
    pub fn required_permission(&self, path: &str) -> Option<&Permission> {
        self.permissions.get(path)
    }

    /// Coarse gate: routes whose allow-list admits `role`.
    pub fn filter_by_role(&self, role: Option<&Role>) -> Vec<&Route> {
        let Some(role) = role else {
            return Vec::new();
        };
        self.routes.iter().filter(|route| route.admits(role)).collect()
    }

    /// Fine gate for one path; paths without a mapped permission are allowed.
    pub fn check_route<A>(&self, path: &str, gate: &Gate<A>) -> bool {
        self.required_permission(path)
            .is_none_or(|permission| gate.should_show(permission))
    }

    /// Menu entries the current role may see, in display order.
    ///
    /// Applies the role allow-list, then the permission map, keeps entries
    /// flagged for the menu, and sorts by order ([`DEFAULT_MENU_ORDER`] when
    /// unset) keeping declaration order for ties.
    pub fn accessible_menu<A>(&self, gate: &Gate<A>) -> Vec<MenuItem> {
        let role = gate.evaluator().current_role();
        let mut items: Vec<MenuItem> = self
            .filter_by_role(role.as_ref())
            .into_iter()
            .filter(|route| self.check_route(&route.path, gate))
            .filter_map(|route| {
                let menu = route.menu.as_ref().filter(|menu| menu.show_in_menu)?;
                Some(MenuItem {
                    path: route.path.clone(),
                    title: menu.title.clone(),
                    icon: menu.icon.clone(),
                    order: menu.order.unwrap_or(DEFAULT_MENU_ORDER),
                })
            })
            .collect();
        items.sort_by_key(|item| item.order);
        items
    }
}

/// Permissions a page needs right after navigation, for preloading.
pub fn page_permissions(path: &str) -> Vec<Permission> {
    let crud = |resource: &str| {
        ["read", "create", "update", "delete"]
            .into_iter()
            .map(|action| trusted(resource, action))
            .collect::<Vec<_>>()
    };

    if path.starts_with("/users") {
        crud("user")
    } else if path.starts_with("/policy") || path.starts_with("/permission") {
        crud("policy")
    } else if path.starts_with("/audit") {
        vec![trusted("audit", "read")]
    } else if SECRET_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
    {
        crud("secret")
    } else {
        vec![trusted("dashboard", "read")]
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Proceed to the requested route.
    Allow,
    /// Go to another path instead.
    Redirect(String),
    /// No route matches the path.
    NotFound,
}

/// Navigation guard combining session state, cache warm-up and role allow-lists.
#[derive(Debug)]
pub struct RouteGuard<A> {
    table: Arc<RouteTable>,
    gate: Gate<A>,
}

impl<A> RouteGuard<A>
where
    A: PermissionApi,
{
    /// Creates a guard over `table`.
    pub fn new(table: Arc<RouteTable>, gate: Gate<A>) -> Self {
        Self { table, gate }
    }

    /// Decides whether navigating to `path` may proceed.
    ///
    /// Initialization failures are logged and do not block navigation; the
    /// page then sees fallback decisions.
    pub async fn navigate(&self, path: &str) -> Navigation {
        let Some(route) = self.table.find(path) else {
            return Navigation::NotFound;
        };
        let evaluator = self.gate.evaluator();
        let Some(role) = evaluator.current_role() else {
            if route.requires_auth {
                return Navigation::Redirect(LOGIN_PATH.to_string());
            }
            return Navigation::Allow;
        };

        if route.path == LOGIN_PATH {
            return Navigation::Redirect(HOME_PATH.to_string());
        }

        match evaluator.ensure_initialized().await {
            Ok(0) => {}
            Ok(count) => debug!(role = %role, count, "permissions loaded on navigation"),
            Err(Error::Unauthenticated) => {}
            Err(error) => warn!(role = %role, error = %error, "permission initialization failed"),
        }

        if !route.admits(&role) {
            debug!(role = %role, path, "route not allowed for role");
            return Navigation::Redirect(HOME_PATH.to_string());
        }
        Navigation::Allow
    }
}

/// Menu that recomputes only after the permission cache changes.
#[derive(Debug)]
pub struct MenuView<A> {
    table: Arc<RouteTable>,
    gate: Gate<A>,
    dirty: Arc<AtomicBool>,
    items: Mutex<Vec<MenuItem>>,
    _subscription: Subscription,
}

impl<A> MenuView<A> {
    /// Creates a view and subscribes it to cache changes.
    pub fn new(table: Arc<RouteTable>, gate: Gate<A>) -> Self {
        let dirty = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&dirty);
        let subscription = gate
            .evaluator()
            .subscribe(Arc::new(move |_: &CacheEvent| {
                flag.store(true, Ordering::Release);
            }));
        Self {
            table,
            gate,
            dirty,
            items: Mutex::new(Vec::new()),
            _subscription: subscription,
        }
    }

    /// Returns whether the next [`items`](MenuView::items) call recomputes.
    pub fn is_stale(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Returns the current menu, recomputing it if the cache changed.
    pub fn items(&self) -> Vec<MenuItem> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        if self.dirty.swap(false, Ordering::AcqRel) {
            *items = self.table.accessible_menu(&self.gate);
        }
        items.clone()
    }
}
