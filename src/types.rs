use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;

/// Role that every check resolves to `true` for unless overridden on the builder.
pub const SUPER_ADMIN: &str = "super_admin";
/// Security manager role.
pub const SEC_MGR: &str = "sec_mgr";
/// Developer role.
pub const DEV: &str = "dev";
/// Auditor role.
pub const AUDITOR: &str = "auditor";

fn validate_segment(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_segment_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

// ':' separates key segments, so it is never part of a segment.
fn is_allowed_segment_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

macro_rules! define_segment_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated value.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_segment(value.as_ref(), $kind).map(Self)
            }

            /// Creates a value from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_segment_type!(
    /// User role, e.g. `super_admin` or `dev`.
    Role,
    "role"
);
define_segment_type!(
    /// Resource half of a permission, e.g. `secret`.
    ResourceName,
    "resource name"
);
define_segment_type!(
    /// Action half of a permission, e.g. `read`.
    Action,
    "action"
);

impl Role {
    /// Returns the default bypass role.
    pub fn super_admin() -> Self {
        Self::from_string(SUPER_ADMIN.to_string())
    }
}

/// Cache index for one decision: `(role, resource, action)`.
///
/// Rendered as `"{role}:{resource}:{action}"`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PermissionKey {
    role: Role,
    resource: ResourceName,
    action: Action,
}

impl PermissionKey {
    /// Creates a key from its three parts.
    pub fn new(role: Role, resource: ResourceName, action: Action) -> Self {
        Self {
            role,
            resource,
            action,
        }
    }

    /// Returns the role segment.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns the resource segment.
    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    /// Returns the action segment.
    pub fn action(&self) -> &Action {
        &self.action
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.role, self.resource, self.action)
    }
}
