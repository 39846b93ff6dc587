use std::sync::{PoisonError, RwLock};

use crate::types::Role;

/// Identity of the signed-in user.
///
/// Shared through `Arc` between the evaluator and the gating layer. Role
/// changes should go through [`Evaluator::login`], [`Evaluator::logout`] and
/// [`Evaluator::change_role`] so the permission cache follows the identity.
///
/// [`Evaluator::login`]: crate::Evaluator::login
/// [`Evaluator::logout`]: crate::Evaluator::logout
/// [`Evaluator::change_role`]: crate::Evaluator::change_role
#[derive(Debug, Default)]
pub struct Session {
    role: RwLock<Option<Role>>,
}

impl Session {
    /// Creates a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session already bound to `role`, e.g. restored from storage.
    pub fn with_role(role: Role) -> Self {
        Self {
            role: RwLock::new(Some(role)),
        }
    }

    /// Returns the current role.
    pub fn role(&self) -> Option<Role> {
        self.role
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns whether a role is bound.
    pub fn is_authenticated(&self) -> bool {
        self.role
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns whether the current role equals `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|current| current.as_str() == role)
    }

    /// Replaces the bound role and returns the previous one.
    pub(crate) fn replace(&self, role: Option<Role>) -> Option<Role> {
        let mut guard = self.role.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, role)
    }
}
