//! Route handlers.
//!
//! Every protected handler consults the session gate first and redirects
//! logged-out requests to the entry point before anything else runs; the
//! collaborators are only ever reached behind that check.

use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use crate::auth::flow;
use crate::auth::identity::{self, UserInfo};
use crate::error::{AppError, AppResult};
use crate::services::posts::FormFields;

use super::{establish_session, found, logged_in_sid, no_cache, session_sid, views, AppState};

/// Resolve the current user's profile, fresh from the identity provider,
/// caching it on the session.
async fn current_user(state: &AppState, sid: &str) -> AppResult<UserInfo> {
    let session = state.sessions.snapshot(sid).ok_or(AppError::NotLoggedIn)?;
    let info = identity::get_user_info(&state.config, &state.http, &session).await?;
    state.sessions.cache_user_info(sid, info.clone());
    Ok(info)
}

pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if logged_in_sid(&state, &headers)?.is_some() {
        Ok(found("/posts"))
    } else {
        Ok(views::login_page().into_response())
    }
}

#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    pub post_id: Option<String>,
}

pub async fn posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PostsQuery>,
) -> AppResult<Response> {
    let Some(sid) = logged_in_sid(&state, &headers)? else {
        return Ok(found("/"));
    };
    let user = current_user(&state, &sid).await?;

    match q.post_id {
        Some(post_id) => {
            let detail = state.posts.get_post(&post_id, &user).await?;
            Ok(views::post_page(&user, &detail).into_response())
        }
        None => {
            let posts = state.posts.list_posts().await?;
            Ok(views::posts_page(&user, &posts).into_response())
        }
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(fields): Form<FormFields>,
) -> AppResult<Response> {
    let Some(sid) = logged_in_sid(&state, &headers)? else {
        return Ok(found("/"));
    };
    let user = current_user(&state, &sid).await?;
    state.posts.create_post(&fields, &user).await?;
    Ok(found("/posts"))
}

pub async fn post_form(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let Some(sid) = logged_in_sid(&state, &headers)? else {
        return Ok(found("/"));
    };
    let user = current_user(&state, &sid).await?;
    Ok(views::post_form_page(&user).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub post_id: Option<String>,
}

pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<CommentQuery>,
    Form(fields): Form<FormFields>,
) -> AppResult<Response> {
    let Some(sid) = logged_in_sid(&state, &headers)? else {
        return Ok(found("/"));
    };
    let user = current_user(&state, &sid).await?;
    let post_id =
        q.post_id.ok_or_else(|| AppError::UserInput("post_id query parameter required".into()))?;
    state.posts.create_comment(&fields, &user, &post_id).await?;
    Ok(found(&format!("/posts?post_id={}", urlencoding::encode(&post_id))))
}

pub async fn comment_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<CommentQuery>,
) -> AppResult<Response> {
    let Some(sid) = logged_in_sid(&state, &headers)? else {
        return Ok(found("/"));
    };
    let user = current_user(&state, &sid).await?;
    let post_id =
        q.post_id.ok_or_else(|| AppError::UserInput("post_id query parameter required".into()))?;
    Ok(views::comment_form_page(&user, &post_id).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub user_id: Option<String>,
    pub post_id: Option<String>,
}

pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SubscribeQuery>,
) -> AppResult<Response> {
    let Some(sid) = logged_in_sid(&state, &headers)? else {
        return Ok(found("/"));
    };
    let user = current_user(&state, &sid).await?;
    let target: i64 = q
        .user_id
        .as_deref()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| AppError::UserInput("user_id query parameter must be an integer".into()))?;
    state.notifier.subscribe(target, &user).await?;
    info!("notify.subscribe target={} subscriber={}", target, user.id);

    Ok(match q.post_id {
        Some(post_id) => found(&format!("/posts?post_id={}", urlencoding::encode(&post_id))),
        None => found("/posts"),
    })
}

/// Begin the OAuth flow: fresh state nonce into the session, 302 to the
/// provider's authorization endpoint, caching disabled.
pub async fn google_login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let (sid, set_cookie) = establish_session(&state, &headers)?;
    let (url, nonce) = flow::authorization_request(&state.config)?;
    state.sessions.set_auth_state(&sid, nonce);
    info!("auth.begin sid={}", sid);

    let mut resp = found(&url);
    if let Some(cookie) = set_cookie {
        resp.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    no_cache(resp.headers_mut());
    Ok(resp)
}

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Complete the OAuth flow: validate the returned state against the stored
/// nonce, exchange the code, open the session gate, register the user with
/// the notifier, then 302 back to the base URI.
pub async fn google_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<AuthCallbackQuery>,
) -> AppResult<Response> {
    let Some(sid) = session_sid(&state, &headers)? else {
        // Callback without a session: nothing to correlate against.
        let mut resp = found("/");
        no_cache(resp.headers_mut());
        return Ok(resp);
    };

    // The stored nonce is taken here, so a replayed callback cannot match.
    let expected = state.sessions.take_auth_state(&sid);
    match (expected.as_deref(), q.state.as_deref()) {
        (Some(e), Some(r)) if e == r => {}
        _ => {
            return Err(AppError::AuthExchange(
                "state parameter does not match the stored nonce".into(),
            ))
        }
    }

    let code = q
        .code
        .as_deref()
        .ok_or_else(|| AppError::AuthExchange("callback carried no authorization code".into()))?;
    let pair = flow::exchange_code(&state.config, &state.http, code).await?;
    state.sessions.login(&sid, pair);

    let user = current_user(&state, &sid).await?;
    state.notifier.add_user(&user).await?;
    info!("auth.complete sid={} user_id={}", sid, user.id);

    let mut resp = found(state.config.base_uri()?);
    no_cache(resp.headers_mut());
    Ok(resp)
}

/// Log out: clear session keys and 302 to the base URI, caching disabled.
pub async fn google_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if let Some(sid) = session_sid(&state, &headers)? {
        state.sessions.logout(&sid);
        info!("auth.logout sid={}", sid);
    }
    let mut resp = found(state.config.base_uri()?);
    no_cache(resp.headers_mut());
    Ok(resp)
}
