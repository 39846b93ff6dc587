use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{Action, ResourceName, Role};

/// Remote permission API.
///
/// The server owns every authorization decision; implementations only
/// transport them. Timeouts are the transport's concern and surface as an
/// ordinary error.
#[async_trait]
pub trait PermissionApi: Send + Sync {
    /// Returns whether `role` may perform `action` on `resource`.
    async fn check_permission(
        &self,
        role: &Role,
        resource: &ResourceName,
        action: &Action,
    ) -> std::result::Result<bool, ApiError>;

    /// Returns every known decision for `role`, keyed by `resource:action`.
    async fn user_permissions(
        &self,
        role: &Role,
    ) -> std::result::Result<HashMap<String, bool>, ApiError>;

    /// Asks the server to reload its policy.
    async fn reload_policy(&self) -> std::result::Result<(), ApiError>;
}

#[async_trait]
impl<T> PermissionApi for std::sync::Arc<T>
where
    T: PermissionApi + ?Sized,
{
    async fn check_permission(
        &self,
        role: &Role,
        resource: &ResourceName,
        action: &Action,
    ) -> std::result::Result<bool, ApiError> {
        (**self).check_permission(role, resource, action).await
    }

    async fn user_permissions(
        &self,
        role: &Role,
    ) -> std::result::Result<HashMap<String, bool>, ApiError> {
        (**self).user_permissions(role).await
    }

    async fn reload_policy(&self) -> std::result::Result<(), ApiError> {
        (**self).reload_policy().await
    }
}
