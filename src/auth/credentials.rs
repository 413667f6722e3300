//! Credential assembly: stored token pair + static client settings.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::session::SessionData;

/// Provider credential object used for downstream identity queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
}

/// Pure data transformation from session state to provider credentials.
/// Fails when the gate is closed; never touches the network.
pub fn build_credentials(session: &SessionData, config: &AppConfig) -> AppResult<Credentials> {
    let pair = session.token_pair.as_ref().ok_or(AppError::NotLoggedIn)?;
    Ok(Credentials {
        access_token: pair.access_token.clone(),
        refresh_token: pair.refresh_token.clone(),
        client_id: config.client_id()?.to_string(),
        client_secret: config.client_secret()?.to_string(),
        token_uri: config.token_endpoint.clone(),
    })
}
