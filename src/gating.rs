//! Visibility and enablement decisions for UI elements.
//!
//! Everything here is synchronous and reads only cached decisions, so it is
//! safe to call from a render path.

use std::sync::Arc;

use tracing::warn;

use crate::evaluator::Evaluator;
use crate::permission::Permission;
use crate::types::{Action, ResourceName, Role};

/// How a denied element is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GateMode {
    /// Remove the element.
    #[default]
    Hide,
    /// Keep the element but make it inert.
    Disable,
}

/// Presentation decided for a gated element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Shown and enabled.
    Visible,
    /// Not shown.
    Hidden,
    /// Shown but inert.
    Disabled,
}

impl Affordance {
    /// Returns whether the element is rendered at all.
    pub fn is_visible(self) -> bool {
        !matches!(self, Self::Hidden)
    }

    /// Returns whether the element accepts interaction.
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Visible)
    }
}

/// Declarative permission binding attached to an element.
///
/// Fields are optional because bindings come from markup; a binding missing
/// either half is treated as unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GateBinding {
    /// Resource half of the required permission.
    pub resource: Option<String>,
    /// Action half of the required permission.
    pub action: Option<String>,
    /// Presentation when denied.
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: GateMode,
}

impl GateBinding {
    /// Binding that hides the element when denied.
    pub fn hide(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            action: Some(action.into()),
            mode: GateMode::Hide,
        }
    }

    /// Binding that disables the element when denied.
    pub fn disable(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            action: Some(action.into()),
            mode: GateMode::Disable,
        }
    }
}

/// Action flags for one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Abilities {
    /// `create` is allowed.
    pub can_create: bool,
    /// `read` is allowed.
    pub can_read: bool,
    /// `update` is allowed.
    pub can_update: bool,
    /// `delete` is allowed.
    pub can_delete: bool,
    /// `request` is allowed: ask for access to an item of the resource.
    pub can_request: bool,
    /// `temp` is allowed: grant temporary access to an item.
    pub can_temp: bool,
    /// Any of create, update or delete.
    pub can_manage: bool,
}

/// Gating layer over an [`Evaluator`].
#[derive(Debug)]
pub struct Gate<A> {
    evaluator: Arc<Evaluator<A>>,
}

impl<A> Clone for Gate<A> {
    fn clone(&self) -> Self {
        Self {
            evaluator: Arc::clone(&self.evaluator),
        }
    }
}

impl<A> Gate<A> {
    /// Creates a gate reading from `evaluator`.
    pub fn new(evaluator: Arc<Evaluator<A>>) -> Self {
        Self { evaluator }
    }

    /// Returns the underlying evaluator.
    pub fn evaluator(&self) -> &Arc<Evaluator<A>> {
        &self.evaluator
    }

    /// Returns whether an element guarded by `permission` is shown.
    pub fn should_show(&self, permission: &Permission) -> bool {
        self.evaluator.check_sync(permission, false)
    }

    /// Returns whether an element guarded by `permission` is disabled.
    pub fn should_disable(&self, permission: &Permission) -> bool {
        !self.should_show(permission)
    }

    /// Resolves a permission binding.
    ///
    /// Signed-out sessions hide everything. A binding without resource or
    /// action is logged and left unrestricted; a binding naming an invalid
    /// permission is treated as denied.
    pub fn bind(&self, binding: &GateBinding) -> Affordance {
        if !self.evaluator.session().is_authenticated() {
            return Affordance::Hidden;
        }

        let (Some(resource), Some(action)) = (
            binding.resource.as_deref().filter(|value| !value.trim().is_empty()),
            binding.action.as_deref().filter(|value| !value.trim().is_empty()),
        ) else {
            warn!(?binding, "permission binding requires resource and action");
            return Affordance::Visible;
        };

        let allowed = match Permission::new(resource, action) {
            Ok(permission) => self.should_show(&permission),
            Err(error) => {
                warn!(resource, action, error = %error, "permission binding is invalid");
                false
            }
        };

        match (allowed, binding.mode) {
            (true, _) => Affordance::Visible,
            (false, GateMode::Hide) => Affordance::Hidden,
            (false, GateMode::Disable) => Affordance::Disabled,
        }
    }

    /// Resolves a role binding: shown only to the listed roles.
    pub fn bind_role(&self, roles: &[Role]) -> Affordance {
        let Some(current) = self.evaluator.current_role() else {
            return Affordance::Hidden;
        };
        if roles.is_empty() {
            warn!("role binding requires at least one role");
            return Affordance::Visible;
        }
        if roles.contains(&current) {
            Affordance::Visible
        } else {
            Affordance::Hidden
        }
    }

    /// Returns the action flags of `resource` for the current role.
    pub fn abilities(&self, resource: &ResourceName) -> Abilities {
        let can = |action: &str| {
            let permission = Permission::from_parts(
                resource.clone(),
                Action::from_string(action.to_string()),
            );
            self.should_show(&permission)
        };
        let can_create = can("create");
        let can_update = can("update");
        let can_delete = can("delete");
        Abilities {
            can_create,
            can_read: can("read"),
            can_update,
            can_delete,
            can_request: can("request"),
            can_temp: can("temp"),
            can_manage: can_create || can_update || can_delete,
        }
    }
}
