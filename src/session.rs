//! Server-side session store: the session gate every route consults.
//!
//! Each browser gets one session, keyed by a random id carried in a signed
//! cookie. The session holds exactly three things: the OAuth token pair
//! (presence of which *is* the logged-in state), the single-use flow state
//! nonce, and the most recently resolved user profile. There is no expiry or
//! refresh handling; a present token pair counts as logged in until logout.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use getrandom::getrandom;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha2::Sha256;

use crate::auth::identity::UserInfo;
use crate::auth::types::TokenPair;
use crate::tprintln;

type HmacSha256 = Hmac<Sha256>;

/// Per-client session state. Created empty on first request, mutated on
/// login/logout, dropped with the process (no persistence).
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub token_pair: Option<TokenPair>,
    pub auth_state: Option<String>,
    pub user_info: Option<UserInfo>,
}

fn gen_id() -> String {
    let mut bytes = [0u8; 16];
    let _ = getrandom(&mut bytes);
    let mut id = String::with_capacity(32);
    use std::fmt::Write as _;
    for b in &bytes {
        let _ = write!(&mut id, "{:02x}", b);
    }
    id
}

/// Generate a fresh single-use state nonce for the OAuth flow.
pub fn gen_nonce() -> String {
    gen_id()
}

fn sid_signature(secret: &str, sid: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(sid.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Produce the cookie value `sid.signature` for a session id.
pub fn sign_sid(secret: &str, sid: &str) -> String {
    format!("{}.{}", sid, sid_signature(secret, sid))
}

/// Recover the session id from a cookie value, rejecting bad signatures.
/// A tampered or unsigned cookie is treated as no session at all.
pub fn verify_cookie(secret: &str, value: &str) -> Option<String> {
    let (sid, sig) = value.split_once('.')?;
    if sid.is_empty() || sig != sid_signature(secret, sid) {
        return None;
    }
    Some(sid.to_string())
}

/// In-memory session map shared by all handlers.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty session and return its id.
    pub fn create(&self) -> String {
        let sid = gen_id();
        self.inner.write().insert(sid.clone(), SessionData::default());
        tprintln!("session.create sid={}", sid);
        sid
    }

    /// True iff the session exists and holds a token pair.
    pub fn is_logged_in(&self, sid: &str) -> bool {
        self.inner.read().get(sid).map(|s| s.token_pair.is_some()).unwrap_or(false)
    }

    /// Store the token pair obtained from the provider, creating the session
    /// if the id is unknown.
    pub fn login(&self, sid: &str, pair: TokenPair) {
        let mut map = self.inner.write();
        let entry = map.entry(sid.to_string()).or_default();
        entry.token_pair = Some(pair);
    }

    /// Clear token pair, flow nonce and cached profile.
    pub fn logout(&self, sid: &str) {
        if let Some(entry) = self.inner.write().get_mut(sid) {
            entry.token_pair = None;
            entry.auth_state = None;
            entry.user_info = None;
        }
    }

    /// Persist the flow state nonce ahead of the provider redirect.
    pub fn set_auth_state(&self, sid: &str, state: String) {
        let mut map = self.inner.write();
        let entry = map.entry(sid.to_string()).or_default();
        entry.auth_state = Some(state);
    }

    /// Take the stored nonce, consuming it. Single-use: a second callback
    /// against the same session finds nothing to match.
    pub fn take_auth_state(&self, sid: &str) -> Option<String> {
        self.inner.write().get_mut(sid).and_then(|s| s.auth_state.take())
    }

    pub fn cache_user_info(&self, sid: &str, info: UserInfo) {
        if let Some(entry) = self.inner.write().get_mut(sid) {
            entry.user_info = Some(info);
        }
    }

    /// Clone of the current session state, for credential building.
    pub fn snapshot(&self, sid: &str) -> Option<SessionData> {
        self.inner.read().get(sid).cloned()
    }
}
