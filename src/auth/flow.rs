//! OAuth authorization-code flow against the identity provider.
//!
//! Two halves of the redirect dance: building the authorization URL the
//! browser is sent to (with a fresh state nonce the caller persists in the
//! session), and exchanging the returned code for a token pair. State
//! comparison itself happens at the callback route, which owns the session.

use crate::config::{AppConfig, AUTHORIZATION_SCOPE};
use crate::error::{AppError, AppResult};
use crate::session::gen_nonce;

use super::types::{TokenPair, TokenResponse};

/// Build the provider authorization URL and the state nonce that goes with
/// it. The caller stores the nonce in the session before redirecting.
pub fn authorization_request(config: &AppConfig) -> AppResult<(String, String)> {
    let client_id = config.client_id()?;
    let redirect_uri = config.redirect_uri()?;
    let state = gen_nonce();

    let params: Vec<(&str, &str)> = vec![
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("scope", AUTHORIZATION_SCOPE),
        ("state", &state),
        // offline access + forced consent so the provider issues a refresh token
        ("access_type", "offline"),
        ("prompt", "consent"),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    Ok((format!("{}?{}", config.authorization_endpoint, query), state))
}

/// Exchange the authorization code for a token pair at the token endpoint.
pub async fn exchange_code(
    config: &AppConfig,
    http: &reqwest::Client,
    code: &str,
) -> AppResult<TokenPair> {
    let request_body: Vec<(&str, &str)> = vec![
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id()?),
        ("client_secret", config.client_secret()?),
        ("code", code),
        ("redirect_uri", config.redirect_uri()?),
    ];

    let response = http
        .post(&config.token_endpoint)
        .form(&request_body)
        .send()
        .await
        .map_err(|e| AppError::AuthExchange(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::AuthExchange(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .map_err(|e| AppError::AuthExchange(format!("invalid token response: {}", e)))?;
    Ok(TokenPair::from(tokens))
}
