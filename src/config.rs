//! Process-wide configuration, read once at startup and passed to the
//! components that need it. Missing values stay `None` and only surface as
//! an error when a route that uses them is hit.

use crate::error::{AppError, AppResult};

/// Google token endpoint used for the authorization-code exchange.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v4/token";
/// Google authorization endpoint the browser is redirected to.
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google userinfo endpoint queried by the identity resolver.
pub const DEFAULT_USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested during login.
pub const AUTHORIZATION_SCOPE: &str = "openid email profile";

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Application configuration sourced from `BULLETIN_*` environment variables.
///
/// OAuth client settings and collaborator URIs are optional at startup; the
/// provider endpoints default to Google's but can be overridden, which is
/// also how the test suite points the auth flow at a mock provider.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_port: u16,
    /// Where the provider sends the browser back to (`/google/auth`).
    pub redirect_uri: Option<String>,
    /// Application base URI used for post-auth and logout redirects.
    pub base_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Key for signing the session cookie.
    pub session_secret: Option<String>,
    /// Base URI of the post storage collaborator.
    pub post_service_uri: Option<String>,
    /// Base URI of the notification collaborator.
    pub notify_service_uri: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let http_port = std::env::var("BULLETIN_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7878);
        Self {
            http_port,
            redirect_uri: env_opt("BULLETIN_REDIRECT_URI"),
            base_uri: env_opt("BULLETIN_BASE_URI"),
            client_id: env_opt("BULLETIN_CLIENT_ID"),
            client_secret: env_opt("BULLETIN_CLIENT_SECRET"),
            session_secret: env_opt("BULLETIN_SESSION_SECRET"),
            post_service_uri: env_opt("BULLETIN_POST_SERVICE_URI"),
            notify_service_uri: env_opt("BULLETIN_NOTIFY_SERVICE_URI"),
            authorization_endpoint: env_opt("BULLETIN_AUTHORIZATION_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_AUTHORIZATION_ENDPOINT.to_string()),
            token_endpoint: env_opt("BULLETIN_TOKEN_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
            userinfo_endpoint: env_opt("BULLETIN_USERINFO_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_USERINFO_ENDPOINT.to_string()),
        }
    }

    pub fn redirect_uri(&self) -> AppResult<&str> {
        self.redirect_uri.as_deref().ok_or(AppError::Config("BULLETIN_REDIRECT_URI"))
    }

    pub fn base_uri(&self) -> AppResult<&str> {
        self.base_uri.as_deref().ok_or(AppError::Config("BULLETIN_BASE_URI"))
    }

    pub fn client_id(&self) -> AppResult<&str> {
        self.client_id.as_deref().ok_or(AppError::Config("BULLETIN_CLIENT_ID"))
    }

    pub fn client_secret(&self) -> AppResult<&str> {
        self.client_secret.as_deref().ok_or(AppError::Config("BULLETIN_CLIENT_SECRET"))
    }

    pub fn session_secret(&self) -> AppResult<&str> {
        self.session_secret.as_deref().ok_or(AppError::Config("BULLETIN_SESSION_SECRET"))
    }
}
