use crate::error::{Error, Result};
use crate::types::{Action, PermissionKey, ResourceName, Role};
use std::fmt;

/// Resource/action pair, the unit of permission granularity.
///
/// The textual form is `resource:action`, which is also the key format of the
/// server's bulk permission map.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Permission {
    resource: ResourceName,
    action: Action,
}

impl Permission {
    /// Parses `resource:action`.
    ///
    /// This trims whitespace and normalizes to lowercase.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let normalized = value.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not be empty".to_string(),
            ));
        }
        let (resource, action) = split_permission(&normalized).ok_or_else(|| {
            Error::InvalidPermission("permission must be in resource:action format".to_string())
        })?;
        if resource.is_empty() || action.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not have empty segments".to_string(),
            ));
        }
        let resource = ResourceName::new(resource)
            .map_err(|err| Error::InvalidPermission(err.to_string()))?;
        let action =
            Action::new(action).map_err(|err| Error::InvalidPermission(err.to_string()))?;
        Ok(Self { resource, action })
    }

    /// Creates a permission from validated parts.
    pub fn from_parts(resource: ResourceName, action: Action) -> Self {
        Self { resource, action }
    }

    /// Creates a permission from raw resource and action strings.
    pub fn new(resource: impl AsRef<str>, action: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            resource: ResourceName::new(resource)?,
            action: Action::new(action)?,
        })
    }

    /// Returns the resource segment.
    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    /// Returns the action segment.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Builds the cache key of this permission for `role`.
    pub fn key_for(&self, role: &Role) -> PermissionKey {
        PermissionKey::new(role.clone(), self.resource.clone(), self.action.clone())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl TryFrom<&str> for Permission {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Permission {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

pub(crate) fn split_permission(value: &str) -> Option<(&str, &str)> {
    value.rsplit_once(':')
}
