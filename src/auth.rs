//! User authentication: the [Authenticator] seam the navigation guard depends on and the [PkceAuthenticator] that
//! implements it against the Spotify accounts service.

pub(crate) mod pkce;

pub use self::pkce::PkceAuthenticator;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;

use crate::{
    error::{Error, Result},
    model::{
        error::{AuthenticationErrorKind, AuthenticationErrorResponse},
        token::AccessToken,
    },
};

/// Result of checking whether the user holds a usable session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    pub authenticated: bool,
    pub access_token: Option<AccessToken>,
}

/// Anything able to tell whether the user is currently authenticated.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Checks for a usable session, refreshing an expired access token if possible.
    ///
    /// Returns `authenticated: false` when there is no session to speak of. Errors are reserved for sessions that
    /// exist but couldn't be validated.
    async fn authenticate(&self) -> Result<AuthenticationResponse>;
}

#[async_trait]
impl<A> Authenticator for Arc<A>
where
    A: Authenticator + ?Sized,
{
    async fn authenticate(&self) -> Result<AuthenticationResponse> {
        (**self).authenticate().await
    }
}

impl AuthenticationResponse {
    pub(crate) fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            access_token: None,
        }
    }

    pub(crate) fn authenticated(access_token: AccessToken) -> Self {
        Self {
            authenticated: true,
            access_token: Some(access_token),
        }
    }
}

/// Takes a response for an authentication request and if its status is 400, parses its body as an authentication error.
/// On success returns the given response without modifying it.
async fn extract_authentication_error(response: reqwest::Response) -> Result<reqwest::Response> {
    if let StatusCode::BAD_REQUEST = response.status() {
        let error_response: AuthenticationErrorResponse = response.json().await?;
        debug!("Got authentication error response: {:?}", error_response);

        Err(error_response.into_unhandled_error())
    } else {
        Ok(response.error_for_status()?)
    }
}

fn map_authorization_code_error(err: Error) -> Error {
    if let Error::UnhandledAuthenticationError(AuthenticationErrorKind::InvalidGrant, _) = err {
        Error::InvalidAuthorizationCode
    } else {
        err
    }
}

fn map_refresh_token_error(err: Error) -> Error {
    if let Error::UnhandledAuthenticationError(AuthenticationErrorKind::InvalidGrant, description) = err {
        Error::InvalidRefreshToken(description)
    } else {
        err
    }
}
