//! Identity resolution: fetch the current user's profile from the provider's
//! userinfo endpoint and normalize it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::session::SessionData;

use super::credentials::build_credentials;

/// Resolved user profile. `id` is always an integer; providers sometimes
/// serialize it as a decimal string and that form is normalized on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

fn normalize_id(raw: Option<&Value>) -> AppResult<i64> {
    match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| AppError::MalformedIdentity(format!("non-integer id: {}", n))),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map_err(|_| AppError::MalformedIdentity(format!("non-numeric id: {:?}", s))),
        Some(other) => Err(AppError::MalformedIdentity(format!("unexpected id value: {}", other))),
        None => Err(AppError::MalformedIdentity("id field missing".into())),
    }
}

fn opt_str(profile: &Value, key: &str) -> Option<String> {
    profile.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Fetch the current user's profile, fresh, using session credentials.
pub async fn get_user_info(
    config: &AppConfig,
    http: &reqwest::Client,
    session: &SessionData,
) -> AppResult<UserInfo> {
    let credentials = build_credentials(session, config)?;

    let response = http
        .get(&config.userinfo_endpoint)
        .bearer_auth(&credentials.access_token)
        .send()
        .await
        .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::IdentityProvider(format!(
            "userinfo endpoint returned {}",
            status
        )));
    }

    let profile: Value = response
        .json()
        .await
        .map_err(|e| AppError::IdentityProvider(format!("invalid userinfo response: {}", e)))?;

    Ok(UserInfo {
        id: normalize_id(profile.get("id"))?,
        email: opt_str(&profile, "email"),
        name: opt_str(&profile, "name"),
        picture: opt_str(&profile, "picture"),
    })
}
