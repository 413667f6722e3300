//! OAuth token types.

use serde::{Deserialize, Serialize};

/// Access + refresh token issued by the identity provider. Owned by the
/// session and opaque everywhere else. The refresh token is optional since
/// providers only issue one on consent-prompt flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Token endpoint response (RFC 6749). Fields beyond the pair are accepted
/// and dropped.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        Self { access_token: response.access_token, refresh_token: response.refresh_token }
    }
}
