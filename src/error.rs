use thiserror::Error;

/// Error type returned by [`PermissionApi`](crate::PermissionApi) implementations.
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Read paths (`check_async`, `check_sync`, batch and preload) never surface
/// these; they degrade to the fallback decision instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote permission API failure.
    #[error("permission api error: {0}")]
    Api(#[source] ApiError),
    /// Invalid role, resource or action input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid `resource:action` input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// Operation requires a signed-in session.
    #[error("no role bound to the current session")]
    Unauthenticated,
    /// Server returned a permission map key that is not `resource:action`.
    #[error("server returned invalid permission key {0:?}")]
    InvalidServerKey(String),
}

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        Self::Api(error)
    }
}
