use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use parking_lot::Mutex;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{router, AppState, SESSION_COOKIE};
use crate::auth::identity::UserInfo;
use crate::auth::types::TokenPair;
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::services::notify::Notifier;
use crate::services::posts::{Comment, FormFields, Post, PostDetail, PostStore};
use crate::session;

const SECRET: &str = "test-secret";

#[derive(Default)]
struct RecordingPostStore {
    created_posts: Mutex<Vec<(FormFields, UserInfo)>>,
    created_comments: Mutex<Vec<(FormFields, UserInfo, String)>>,
    reads: Mutex<usize>,
    listing: Mutex<Vec<Post>>,
}

impl RecordingPostStore {
    fn call_count(&self) -> usize {
        self.created_posts.lock().len() + self.created_comments.lock().len() + *self.reads.lock()
    }
}

#[async_trait]
impl PostStore for RecordingPostStore {
    async fn create_post(&self, fields: &FormFields, author: &UserInfo) -> AppResult<()> {
        self.created_posts.lock().push((fields.clone(), author.clone()));
        Ok(())
    }

    async fn get_post(&self, post_id: &str, _requester: &UserInfo) -> AppResult<PostDetail> {
        *self.reads.lock() += 1;
        Ok(PostDetail {
            post: Post {
                id: post_id.parse().unwrap_or(0),
                title: "A post".into(),
                content: "Body".into(),
                author_id: 9,
                author_name: "Author".into(),
                created_at: None,
            },
            comments: vec![Comment {
                id: 1,
                content: "First".into(),
                author_name: "Author".into(),
                created_at: None,
            }],
        })
    }

    async fn list_posts(&self) -> AppResult<Vec<Post>> {
        *self.reads.lock() += 1;
        Ok(self.listing.lock().clone())
    }

    async fn create_comment(
        &self,
        fields: &FormFields,
        author: &UserInfo,
        post_id: &str,
    ) -> AppResult<()> {
        self.created_comments.lock().push((fields.clone(), author.clone(), post_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    subscriptions: Mutex<Vec<(i64, UserInfo)>>,
    registered: Mutex<Vec<UserInfo>>,
}

impl RecordingNotifier {
    fn call_count(&self) -> usize {
        self.subscriptions.lock().len() + self.registered.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn subscribe(&self, target_user_id: i64, subscriber: &UserInfo) -> AppResult<()> {
        self.subscriptions.lock().push((target_user_id, subscriber.clone()));
        Ok(())
    }

    async fn add_user(&self, user: &UserInfo) -> AppResult<()> {
        self.registered.lock().push(user.clone());
        Ok(())
    }
}

fn test_config(provider_uri: &str) -> AppConfig {
    AppConfig {
        http_port: 0,
        redirect_uri: Some("http://app.test/google/auth".into()),
        base_uri: Some("http://app.test".into()),
        client_id: Some("client-1".into()),
        client_secret: Some("secret-1".into()),
        session_secret: Some(SECRET.into()),
        post_service_uri: None,
        notify_service_uri: None,
        authorization_endpoint: format!("{}/auth", provider_uri),
        token_endpoint: format!("{}/token", provider_uri),
        userinfo_endpoint: format!("{}/userinfo", provider_uri),
    }
}

fn make_state(
    config: AppConfig,
) -> (AppState, Arc<RecordingPostStore>, Arc<RecordingNotifier>) {
    let posts = Arc::new(RecordingPostStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState {
        config: Arc::new(config),
        sessions: session::SessionStore::new(),
        http: reqwest::Client::new(),
        posts: posts.clone(),
        notifier: notifier.clone(),
    };
    (state, posts, notifier)
}

fn cookie_for(sid: &str) -> String {
    format!("{}={}", SESSION_COOKIE, session::sign_sid(SECRET, sid))
}

fn logged_in_session(state: &AppState) -> (String, String) {
    let sid = state.sessions.create();
    state
        .sessions
        .login(&sid, TokenPair { access_token: "at".into(), refresh_token: Some("rt".into()) });
    let cookie = cookie_for(&sid);
    (sid, cookie)
}

async fn mock_userinfo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "123",
            "email": "ada@example.com",
            "name": "Ada"
        })))
        .mount(server)
        .await;
}

async fn send(state: &AppState, request: Request<Body>) -> axum::response::Response {
    router(state.clone()).oneshot(request).await.unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn location(resp: &axum::response::Response) -> &str {
    resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or("")
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn protected_routes_redirect_to_entry_without_session() {
    let (state, posts, notifier) = make_state(test_config("http://127.0.0.1:1"));

    let requests = vec![
        get("/posts", None),
        get("/posts?post_id=1", None),
        post_form("/posts", "title=Hi", None),
        get("/posts/create", None),
        post_form("/comments?post_id=1", "content=Hi", None),
        get("/comments/create?post_id=1", None),
        post_form("/subscribe?user_id=1&post_id=1", "", None),
    ];
    for request in requests {
        let resp = send(&state, request).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/");
    }
    assert_eq!(posts.call_count(), 0);
    assert_eq!(notifier.call_count(), 0);
}

#[tokio::test]
async fn tampered_cookie_counts_as_anonymous() {
    let (state, posts, _) = make_state(test_config("http://127.0.0.1:1"));
    let (sid, _) = logged_in_session(&state);
    let forged = format!("{}={}.{}", SESSION_COOKIE, sid, "bogus-signature");

    let resp = send(&state, get("/posts", Some(&forged))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");
    assert_eq!(posts.call_count(), 0);
}

#[tokio::test]
async fn index_renders_login_when_logged_out() {
    let (state, _, _) = make_state(test_config("http://127.0.0.1:1"));
    let resp = send(&state, get("/", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("/google/login"));
}

#[tokio::test]
async fn index_redirects_to_posts_when_logged_in() {
    let (state, _, _) = make_state(test_config("http://127.0.0.1:1"));
    let (_, cookie) = logged_in_session(&state);
    let resp = send(&state, get("/", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts");
}

#[tokio::test]
async fn login_route_redirects_to_provider_with_no_cache() {
    let (state, _, _) = make_state(test_config("http://provider.test"));
    let resp = send(&state, get("/google/login", None)).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    let target = location(&resp).to_string();
    assert!(target.starts_with("http://provider.test/auth?"));
    assert!(target.contains("client_id=client-1"));

    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store, no-cache, must-revalidate, max-age=0"
    );
    assert_eq!(resp.headers().get(header::PRAGMA).unwrap(), "no-cache");
    assert_eq!(resp.headers().get(header::EXPIRES).unwrap(), "-1");

    // A fresh session was handed out, and it holds the nonce embedded in the
    // authorization URL.
    let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    let value = set_cookie
        .strip_prefix(&format!("{}=", SESSION_COOKIE))
        .and_then(|rest| rest.split(';').next())
        .unwrap();
    let sid = session::verify_cookie(SECRET, value).unwrap();
    let nonce = state.sessions.snapshot(&sid).unwrap().auth_state.unwrap();
    assert!(target.contains(&format!("state={}", nonce)));
}

#[tokio::test]
async fn login_route_fails_cleanly_without_client_id() {
    let mut config = test_config("http://provider.test");
    config.client_id = None;
    let (state, _, _) = make_state(config);
    let resp = send(&state, get("/google/login", None)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn oauth_callback_completes_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-fresh",
            "refresh_token": "rt-fresh",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    mock_userinfo(&server).await;

    let (state, _, notifier) = make_state(test_config(&server.uri()));
    let sid = state.sessions.create();
    state.sessions.set_auth_state(&sid, "nonce-1".into());
    let cookie = cookie_for(&sid);

    let resp =
        send(&state, get("/google/auth?state=nonce-1&code=code-1", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "http://app.test");
    assert!(resp.headers().contains_key(header::CACHE_CONTROL));

    assert!(state.sessions.is_logged_in(&sid));
    let pair = state.sessions.snapshot(&sid).unwrap().token_pair.unwrap();
    assert_eq!(
        pair,
        TokenPair { access_token: "at-fresh".into(), refresh_token: Some("rt-fresh".into()) }
    );

    // First login registers the resolved user with the notifier.
    let registered = notifier.registered.lock();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].id, 123);
}

#[tokio::test]
async fn oauth_callback_rejects_state_mismatch() {
    let (state, _, notifier) = make_state(test_config("http://127.0.0.1:1"));
    let sid = state.sessions.create();
    state.sessions.set_auth_state(&sid, "nonce-good".into());
    let cookie = cookie_for(&sid);

    let resp =
        send(&state, get("/google/auth?state=nonce-evil&code=code-1", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(!state.sessions.is_logged_in(&sid));
    assert_eq!(notifier.call_count(), 0);

    // The nonce was consumed: even the right state cannot be replayed.
    let resp =
        send(&state, get("/google/auth?state=nonce-good&code=code-1", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn logout_closes_the_gate() {
    let (state, _, _) = make_state(test_config("http://127.0.0.1:1"));
    let (sid, cookie) = logged_in_session(&state);

    let resp = send(&state, get("/google/logout", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "http://app.test");
    assert!(resp.headers().contains_key(header::CACHE_CONTROL));
    assert!(!state.sessions.is_logged_in(&sid));

    // Protected routes redirect to the entry point again.
    let resp = send(&state, get("/posts", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn create_post_forwards_exact_fields_and_redirects() {
    let server = MockServer::start().await;
    mock_userinfo(&server).await;
    let (state, posts, _) = make_state(test_config(&server.uri()));
    let (_, cookie) = logged_in_session(&state);

    let resp =
        send(&state, post_form("/posts", "title=Hello&content=World", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts");

    let created = posts.created_posts.lock();
    assert_eq!(created.len(), 1);
    let (fields, author) = &created[0];
    assert_eq!(fields.len(), 2);
    assert_eq!(fields.get("title").map(String::as_str), Some("Hello"));
    assert_eq!(fields.get("content").map(String::as_str), Some("World"));
    // String id "123" from the provider arrives as the integer 123.
    assert_eq!(author.id, 123);
    assert_eq!(author.name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn create_comment_redirects_back_to_post() {
    let server = MockServer::start().await;
    mock_userinfo(&server).await;
    let (state, posts, _) = make_state(test_config(&server.uri()));
    let (_, cookie) = logged_in_session(&state);

    let resp =
        send(&state, post_form("/comments?post_id=42", "content=Nice", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts?post_id=42");

    let created = posts.created_comments.lock();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].2, "42");
    assert_eq!(created[0].0.get("content").map(String::as_str), Some("Nice"));
}

#[tokio::test]
async fn subscribe_forwards_target_and_redirects() {
    let server = MockServer::start().await;
    mock_userinfo(&server).await;
    let (state, _, notifier) = make_state(test_config(&server.uri()));
    let (_, cookie) = logged_in_session(&state);

    let resp =
        send(&state, post_form("/subscribe?user_id=7&post_id=3", "", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts?post_id=3");

    let subs = notifier.subscriptions.lock();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].0, 7);
    assert_eq!(subs[0].1.id, 123);
}

#[tokio::test]
async fn subscribe_rejects_non_numeric_user_id() {
    let server = MockServer::start().await;
    mock_userinfo(&server).await;
    let (state, _, notifier) = make_state(test_config(&server.uri()));
    let (_, cookie) = logged_in_session(&state);

    let resp = send(&state, post_form("/subscribe?user_id=bob", "", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(notifier.call_count(), 0);
}

#[tokio::test]
async fn posts_listing_renders_titles() {
    let server = MockServer::start().await;
    mock_userinfo(&server).await;
    let (state, posts, _) = make_state(test_config(&server.uri()));
    posts.listing.lock().push(Post {
        id: 5,
        title: "Release notes".into(),
        content: "All of them".into(),
        author_id: 2,
        author_name: "Rel".into(),
        created_at: None,
    });
    let (_, cookie) = logged_in_session(&state);

    let resp = send(&state, get("/posts", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("Release notes"));
    assert!(body.contains("/posts?post_id=5"));
}

#[tokio::test]
async fn single_post_renders_comments() {
    let server = MockServer::start().await;
    mock_userinfo(&server).await;
    let (state, _, _) = make_state(test_config(&server.uri()));
    let (_, cookie) = logged_in_session(&state);

    let resp = send(&state, get("/posts?post_id=8", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("A post"));
    assert!(body.contains("First"));
}

#[tokio::test]
async fn identity_failure_surfaces_as_clean_error_page() {
    // No userinfo mock: the provider call fails, the page is a plain 502.
    let (state, _, _) = make_state(test_config("http://127.0.0.1:1"));
    let (_, cookie) = logged_in_session(&state);

    let resp = send(&state, get("/posts", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = body_string(resp).await;
    assert!(body.contains("502"));
}
