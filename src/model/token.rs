//! The persisted access token and the pending authorization kept between the authorize redirect and its callback.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Tokens are considered expired this long before their actual expiry, so a request made right after the check still
/// carries a valid token.
const EXPIRY_LEEWAY: Duration = Duration::from_secs(60);

/// An access token as stored under the token storage key.
///
/// The serialized form matches the one the Spotify Web API browser SDK writes: the token endpoint's response fields
/// along with `expires`, the absolute expiry time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub expires: u64,
}

/// A PKCE verifier and the state parameter sent along with the authorize URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub verifier: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    // the refresh grant may omit this, in which case the previous refresh token stays valid
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl AccessToken {
    pub(crate) fn from_response(response: TokenResponse, previous_refresh_token: Option<String>, now: u64) -> Self {
        let refresh_token = response
            .refresh_token
            .or(previous_refresh_token)
            .unwrap_or_default();

        Self {
            expires: now.saturating_add(response.expires_in.saturating_mul(1000)),
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_token,
            scope: response.scope,
        }
    }

    /// Returns whether the token has expired, or is about to, at the given time in Unix epoch milliseconds.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_add(EXPIRY_LEEWAY.as_millis() as u64) >= self.expires
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
