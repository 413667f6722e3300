//! bulletin HTTP server
//! --------------------
//! Axum-based HTTP surface for the application.
//!
//! Responsibilities:
//! - Session handling with a signed session-id cookie backed by the
//!   server-side store.
//! - The route table from the application contract: login page, posts,
//!   comments, subscriptions and the three `/google/*` auth routes.
//! - Redirect/no-cache response helpers shared by the handlers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::services::notify::{HttpNotifier, Notifier};
use crate::services::posts::{HttpPostStore, PostStore};
use crate::session::{self, SessionStore};

pub mod routes;
pub mod views;

#[cfg(test)]
mod tests;

const SESSION_COOKIE: &str = "bulletin_session";
// Cookie lifetime once the login flow starts; Flask's "permanent session" default.
const SESSION_COOKIE_MAX_AGE_SECS: u64 = 31 * 24 * 60 * 60;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub http: reqwest::Client,
    pub posts: Arc<dyn PostStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Mount the full route table onto a router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/posts", get(routes::posts).post(routes::create_post))
        .route("/posts/create", get(routes::post_form))
        .route("/comments", post(routes::create_comment))
        .route("/comments/create", get(routes::comment_form))
        .route("/subscribe", post(routes::subscribe))
        .route("/google/login", get(routes::google_login))
        .route("/google/auth", get(routes::google_auth))
        .route("/google/logout", get(routes::google_logout))
        .with_state(state)
}

/// Start the bulletin HTTP server with the given configuration.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
    let state = AppState {
        posts: Arc::new(HttpPostStore::new(config.post_service_uri.clone(), http.clone())),
        notifier: Arc::new(HttpNotifier::new(config.notify_service_uri.clone(), http.clone())),
        config: Arc::new(config),
        sessions: SessionStore::new(),
        http,
    };

    let addr: SocketAddr = format!("0.0.0.0:{}", state.config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

/// Session id from the request cookie, provided the signature checks out.
/// Fails only when the signing secret is not configured.
pub(crate) fn session_sid(state: &AppState, headers: &HeaderMap) -> AppResult<Option<String>> {
    let secret = state.config.session_secret()?;
    Ok(parse_cookie(headers, SESSION_COOKIE).and_then(|v| session::verify_cookie(secret, &v)))
}

/// Session id when the session gate reports logged in, `None` otherwise.
pub(crate) fn logged_in_sid(state: &AppState, headers: &HeaderMap) -> AppResult<Option<String>> {
    Ok(session_sid(state, headers)?.filter(|sid| state.sessions.is_logged_in(sid)))
}

/// Existing session id, or a fresh session plus the Set-Cookie header that
/// hands its id to the browser. Sessions are created on the first request
/// that needs one.
pub(crate) fn establish_session(
    state: &AppState,
    headers: &HeaderMap,
) -> AppResult<(String, Option<HeaderValue>)> {
    let secret = state.config.session_secret()?;
    if let Some(sid) = session_sid(state, headers)? {
        if state.sessions.snapshot(&sid).is_some() {
            return Ok((sid, None));
        }
    }
    let sid = state.sessions.create();
    let cookie = set_session_cookie(secret, &sid);
    Ok((sid, Some(cookie)))
}

fn set_session_cookie(secret: &str, sid: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path /; SameSite=Lax so the provider's
    // callback redirect still carries it
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session::sign_sid(secret, sid),
        SESSION_COOKIE_MAX_AGE_SECS
    ))
    .unwrap()
}

/// Plain 302 to the given location.
pub(crate) fn found(location: &str) -> Response {
    let value = HeaderValue::from_str(location)
        .unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::FOUND, [(header::LOCATION, value)]).into_response()
}

/// Disable caching on a response; required on all auth routes so browsers
/// never replay a stale auth redirect.
pub(crate) fn no_cache(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("-1"));
}
