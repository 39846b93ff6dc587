//! `reqwest` transport for the console permission endpoints.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::PermissionApi;
use crate::error::ApiError;
use crate::types::{Action, ResourceName, Role};

/// Base URL used when neither the config nor the environment provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";
/// Transport timeout for every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const URL_ENV: &str = "PERM_MIRROR_URL";
const TOKEN_ENV: &str = "PERM_MIRROR_TOKEN";

/// Errors raised by [`HttpApi`].
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Missing or unusable configuration.
    #[error("permission api config error: {0}")]
    Config(String),

    /// The server rejected the credentials (401/403).
    #[error("permission api auth error: {0}")]
    Auth(String),

    /// The server answered with another non-success status.
    #[error("permission api error {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the body, or the status reason.
        message: String,
    },

    /// The request exceeded the transport timeout.
    #[error("permission api request timed out")]
    Timeout,

    /// Network or client failure.
    #[error("permission api network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered for a different role than the one requested.
    #[error("permission api returned permissions of role {actual}, expected {expected}")]
    RoleMismatch {
        /// Role the caller asked for.
        expected: String,
        /// Role named in the response.
        actual: String,
    },

    /// Malformed response body.
    #[error("permission api json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for HttpError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(error)
        }
    }
}

/// Configuration for [`HttpApi`].
///
/// Empty fields fall back to `PERM_MIRROR_URL` and `PERM_MIRROR_TOKEN`; a zero
/// timeout falls back to [`DEFAULT_TIMEOUT`].
#[derive(Debug, Clone, Default)]
pub struct HttpApiConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl HttpApiConfig {
    /// Creates a config for `base_url` authenticated with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn resolve(self) -> std::result::Result<Resolved, HttpError> {
        let token = first_non_empty(&[&self.token, &env_or_empty(TOKEN_ENV)]);
        if token.is_empty() {
            return Err(HttpError::Config(format!(
                "missing token; set {TOKEN_ENV} or pass a token in the config"
            )));
        }
        let base_url = first_non_empty(&[&self.base_url, &env_or_empty(URL_ENV), DEFAULT_BASE_URL])
            .trim_end_matches('/')
            .to_owned();
        let timeout = if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        };
        Ok(Resolved {
            base_url,
            token,
            timeout,
        })
    }
}

struct Resolved {
    base_url: String,
    token: String,
    timeout: Duration,
}

fn env_or_empty(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn first_non_empty(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_owned()
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    role: &'a str,
    resource: &'a str,
    action: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CheckData {
    #[serde(default)]
    has_permission: bool,
}

#[derive(Debug, Deserialize)]
struct AllPermissionsData {
    role: String,
    #[serde(default)]
    permissions: HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Permission API over HTTP with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpApi {
    /// Creates a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Config`] if no token is available, or
    /// [`HttpError::Network`] if the client cannot be built.
    pub fn new(config: HttpApiConfig) -> std::result::Result<Self, HttpError> {
        let resolved = config.resolve()?;
        let client = reqwest::Client::builder()
            .timeout(resolved.timeout)
            .user_agent(concat!("perm-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HttpError::Network)?;
        Ok(Self {
            client,
            base_url: resolved.base_url,
            token: resolved.token,
        })
    }

    /// Returns the resolved base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> std::result::Result<String, HttpError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        Err(status_error(status, &body))
    }
}

fn status_error(status: StatusCode, body: &str) -> HttpError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error.or(parsed.message))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned()
        });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => HttpError::Auth(message),
        _ => HttpError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn parse_check(body: &str) -> std::result::Result<bool, HttpError> {
    let envelope: Envelope<CheckData> = serde_json::from_str(body)?;
    Ok(envelope.data.has_permission)
}

// The map belongs to the token's user; it must not be cached under another role.
fn parse_all(body: &str, role: &Role) -> std::result::Result<HashMap<String, bool>, HttpError> {
    let envelope: Envelope<AllPermissionsData> = serde_json::from_str(body)?;
    if envelope.data.role != role.as_str() {
        return Err(HttpError::RoleMismatch {
            expected: role.to_string(),
            actual: envelope.data.role,
        });
    }
    Ok(envelope.data.permissions)
}

#[async_trait]
impl PermissionApi for HttpApi {
    async fn check_permission(
        &self,
        role: &Role,
        resource: &ResourceName,
        action: &Action,
    ) -> std::result::Result<bool, ApiError> {
        let payload = CheckRequest {
            role: role.as_str(),
            resource: resource.as_str(),
            action: action.as_str(),
        };
        debug!(role = %role, resource = %resource, action = %action, "remote permission check");
        let body = self
            .send(self.client.post(self.url("/permissions/check")).json(&payload))
            .await?;
        Ok(parse_check(&body)?)
    }

    async fn user_permissions(
        &self,
        role: &Role,
    ) -> std::result::Result<HashMap<String, bool>, ApiError> {
        debug!(role = %role, "fetching role permissions");
        let body = self
            .send(self.client.get(self.url("/permissions/all")))
            .await?;
        Ok(parse_all(&body, role)?)
    }

    async fn reload_policy(&self) -> std::result::Result<(), ApiError> {
        self.send(self.client.post(self.url("/permissions/reload")))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_envelope_should_parse() {
        let body = r#"{"data":{"has_permission":true,"role":"dev","resource":"secret","action":"read"}}"#;
        assert!(parse_check(body).unwrap());
    }

    #[test]
    fn all_permissions_envelope_should_parse() {
        let body = r#"{"data":{"role":"dev","permissions":{"secret:read":true,"secret:delete":false}}}"#;
        let permissions = parse_all(body, &Role::try_from("dev").unwrap()).unwrap();

        assert_eq!(permissions.len(), 2);
        assert_eq!(permissions.get("secret:delete"), Some(&false));
    }

    #[test]
    fn permissions_of_another_role_should_be_rejected() {
        let body = r#"{"data":{"role":"sec_mgr","permissions":{"user:create":true}}}"#;

        let result = parse_all(body, &Role::try_from("dev").unwrap());

        assert!(matches!(
            result,
            Err(HttpError::RoleMismatch { ref expected, ref actual })
                if expected == "dev" && actual == "sec_mgr"
        ));
    }

    #[test]
    fn permissions_without_role_should_be_json_error() {
        let body = r#"{"data":{"permissions":{"secret:read":true}}}"#;
        let result = parse_all(body, &Role::try_from("dev").unwrap());

        assert!(matches!(result, Err(HttpError::Json(_))));
    }

    #[test]
    fn malformed_envelope_should_be_json_error() {
        assert!(matches!(parse_check("{\"ok\":true}"), Err(HttpError::Json(_))));
    }

    #[test]
    fn status_error_should_prefer_body_message() {
        let auth = status_error(StatusCode::UNAUTHORIZED, r#"{"error":"token expired"}"#);
        let other = status_error(StatusCode::BAD_GATEWAY, "<html>");

        assert!(matches!(auth, HttpError::Auth(message) if message == "token expired"));
        assert!(matches!(
            other,
            HttpError::Status { status: 502, ref message } if message == "Bad Gateway"
        ));
    }

    #[test]
    fn config_should_apply_defaults() {
        let api = HttpApi::new(HttpApiConfig {
            base_url: "https://console.example/api/v1/".to_string(),
            token: "t0ken".to_string(),
            timeout: Duration::ZERO,
        })
        .unwrap();

        assert_eq!(api.base_url(), "https://console.example/api/v1");
        assert_eq!(api.url("/permissions/all"), "https://console.example/api/v1/permissions/all");
    }
}
