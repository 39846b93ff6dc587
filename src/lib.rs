//! Client-side permission mirror for a role-based secrets console.
//!
//! The server owns every authorization decision. This crate caches those
//! decisions per role, collapses concurrent checks of the same permission into
//! one remote call, and answers UI questions (show, disable, menu, route)
//! synchronously from the cache. Unknown or failed decisions deny by default.
//!
//! Use [`Evaluator`] for checks and session lifecycle, [`Gate`] for element
//! gating and [`RouteTable`] / [`RouteGuard`] for navigation.
//!
//! # Examples
//!
//! Checking permissions with the in-memory API (enable `memory-api`):
//! ```no_run
//! # #[cfg(feature = "memory-api")]
//! # {
//! use perm_mirror::{EvaluatorBuilder, MemoryApi, Permission, Role};
//! use std::sync::Arc;
//! let api = MemoryApi::new();
//! let dev = Role::try_from("dev").unwrap();
//! let read = Permission::parse("secret:read").unwrap();
//! api.grant(dev.clone(), &read);
//! let evaluator = Arc::new(EvaluatorBuilder::new(api).build());
//! futures::executor::block_on(async {
//!     evaluator.login(dev).await.unwrap();
//!     assert!(evaluator.check_sync(&read, false));
//! });
//! # }
//! ```
//!
//! Talking to the console over HTTP (enable `http-client`):
//! ```no_run
//! # #[cfg(feature = "http-client")]
//! # {
//! use perm_mirror::{EvaluatorBuilder, HttpApi, HttpApiConfig};
//! let api = HttpApi::new(HttpApiConfig::new("https://console.example/api/v1", "token")).unwrap();
//! let evaluator = EvaluatorBuilder::new(api).build();
//! # let _ = evaluator;
//! # }
//! ```
#![forbid(unsafe_code)]

mod api;
mod cache;
mod error;
mod evaluator;
mod gating;
mod inflight;
mod observe;
mod permission;
mod routes;
mod session;
mod types;

#[cfg(any(test, feature = "memory-api"))]
mod memory_api;

#[cfg(feature = "http-client")]
mod http;

pub use crate::api::PermissionApi;
pub use crate::cache::PermissionCache;
pub use crate::error::{ApiError, Error, Result};
pub use crate::evaluator::{Evaluator, EvaluatorBuilder};
pub use crate::gating::{Abilities, Affordance, Gate, GateBinding, GateMode};
pub use crate::observe::{CacheEvent, CacheListener, Subscription};
pub use crate::permission::Permission;
pub use crate::routes::{
    DEFAULT_MENU_ORDER, HOME_PATH, LOGIN_PATH, MenuItem, MenuMeta, MenuView, Navigation, Route,
    RouteGuard, RouteTable, page_permissions,
};
pub use crate::session::Session;
pub use crate::types::{
    AUDITOR, Action, DEV, PermissionKey, ResourceName, Role, SEC_MGR, SUPER_ADMIN,
};

#[cfg(feature = "memory-api")]
pub use crate::memory_api::{MemoryApi, Paused};

#[cfg(feature = "http-client")]
pub use crate::http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpApi, HttpApiConfig, HttpError};
