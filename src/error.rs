//! Unified application error model.
//! One enum covers the whole request path: the session gate, the OAuth
//! exchange, identity resolution and collaborator calls. Only the
//! logged-out case is recovered locally (by redirecting to the entry
//! point); everything else maps to a plain error page via `IntoResponse`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Session gate reports logged out. Handled by a redirect to `/`,
    /// never rendered as an error page.
    #[error("user must be logged in")]
    NotLoggedIn,

    /// Authorization-code exchange with the identity provider failed
    /// (network error, provider error response, state mismatch).
    #[error("token exchange failed: {0}")]
    AuthExchange(String),

    /// The userinfo call to the identity provider failed.
    #[error("identity provider request failed: {0}")]
    IdentityProvider(String),

    /// The provider's profile response was missing an `id` or carried a
    /// non-numeric one.
    #[error("malformed identity response: {0}")]
    MalformedIdentity(String),

    /// A post-store or notifier call failed.
    #[error("collaborator call failed: {0}")]
    Collaborator(String),

    /// Bad request input (missing or unparsable query parameter).
    #[error("invalid request: {0}")]
    UserInput(String),

    /// A route needed a configuration value that was absent at startup.
    #[error("missing configuration value {0}")]
    Config(&'static str),
}

impl AppError {
    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::NotLoggedIn => StatusCode::FOUND,
            AppError::AuthExchange(_)
            | AppError::IdentityProvider(_)
            | AppError::MalformedIdentity(_)
            | AppError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            AppError::UserInput(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::NotLoggedIn) {
            // Gate violation: back to the entry point, no error surface.
            return (StatusCode::FOUND, [(header::LOCATION, HeaderValue::from_static("/"))])
                .into_response();
        }
        let status = self.http_status();
        tracing::error!("request failed ({}): {}", status.as_u16(), self);
        let body = crate::server::views::error_page(status, &self.to_string());
        (status, Html(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
