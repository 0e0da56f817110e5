//! Contains the [PkceAuthenticator], which implements the authorization code flow with PKCE and keeps the resulting
//! session in a [TokenStorage].
//!
//! [Spotify documentation on the authorization code flow with PKCE.](https://developer.spotify.com/documentation/web-api/tutorials/code-pkce-flow)
//!
//! # Usage
//!
//! ```no_run
//! # use tunegate::{auth::PkceAuthenticator, config::SpotifyConfig, prelude::*, storage::FileStorage};
//! # async fn foo() -> tunegate::Result<()> {
//! let config = SpotifyConfig::from_env()?;
//! let authenticator = PkceAuthenticator::new(config, FileStorage::new("session.json"));
//!
//! // direct the user to this URL in some manner. the generated verifier and state are kept in storage until the
//! // callback is handled
//! let authorize_url = authenticator.authorize_url()?;
//!
//! // once the user approves the application, Spotify redirects them to the redirect URI with a `code` and a `state`
//! // in the query
//! # let callback_url = "";
//! authenticator.handle_callback_url(callback_url).await?;
//!
//! // from here on the stored token is reused and refreshed as needed
//! let session = authenticator.authenticate().await?;
//! assert!(session.authenticated);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::lock::Mutex;
use log::{debug, warn};
use reqwest::Client as AsyncClient;
use url::Url;

use super::{
    extract_authentication_error, map_authorization_code_error, map_refresh_token_error, AuthenticationResponse,
    Authenticator,
};
use crate::{
    config::SpotifyConfig,
    error::{Error, Result},
    model::token::{now_millis, AccessToken, PendingAuthorization, TokenResponse},
    random::{generate_random_string, pkce_challenge, PKCE_VERIFIER_LENGTH, RANDOM_STATE_LENGTH},
    storage::{JsonStorageExt, TokenStorage, TOKEN_STORAGE_KEY, VERIFIER_STORAGE_KEY},
};

/// Authenticates the user with the authorization code flow with PKCE.
///
/// This struct uses `Arc` internally, so cloning it is cheap and every clone shares the same storage.
#[derive(Debug)]
pub struct PkceAuthenticator<S>
where
    S: TokenStorage,
{
    inner: Arc<PkceAuthenticatorRef<S>>,
    http_client: AsyncClient,
}

#[derive(Debug)]
struct PkceAuthenticatorRef<S> {
    config: SpotifyConfig,
    storage: S,
    // held from reading an expired token until its replacement is stored
    refresh_lock: Mutex<()>,
}

impl<S> Clone for PkceAuthenticator<S>
where
    S: TokenStorage,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            http_client: self.http_client.clone(),
        }
    }
}

impl<S> PkceAuthenticator<S>
where
    S: TokenStorage,
{
    pub fn new(config: SpotifyConfig, storage: S) -> Self {
        Self::with_http_client(config, storage, AsyncClient::new())
    }

    pub fn with_http_client(config: SpotifyConfig, storage: S, http_client: AsyncClient) -> Self {
        Self {
            inner: Arc::new(PkceAuthenticatorRef {
                config,
                storage,
                refresh_lock: Mutex::new(()),
            }),
            http_client,
        }
    }

    pub fn config(&self) -> &SpotifyConfig {
        &self.inner.config
    }

    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Generates a new verifier and state, remembers them in storage and returns the authorize URL the user should be
    /// directed to.
    ///
    /// Calling this again replaces the previous pending authorization, so only the latest URL can be completed.
    pub fn authorize_url(&self) -> Result<String> {
        let pending = PendingAuthorization {
            verifier: generate_random_string(PKCE_VERIFIER_LENGTH),
            state: generate_random_string(RANDOM_STATE_LENGTH),
        };

        self.storage().set_json(VERIFIER_STORAGE_KEY, &pending)?;
        build_authorize_url(self.config(), &pending)
    }

    /// Completes the authorization with the code and state from the callback URL query and stores the resulting token.
    ///
    /// Returns an [AuthorizationCodeStateMismatch-error](Error::AuthorizationCodeStateMismatch) if the state doesn't
    /// match the one generated with the authorize URL.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<AccessToken> {
        debug!("Attempting to complete PKCE authorization with code: {} and state: {}", code, state);

        let pending: PendingAuthorization = self
            .storage()
            .get_json(VERIFIER_STORAGE_KEY)?
            .ok_or(Error::MissingPendingAuthorization)?;

        if state != pending.state {
            return Err(Error::AuthorizationCodeStateMismatch);
        }

        debug!("Requesting access and refresh tokens for authorization code flow with PKCE");
        let response = self
            .http_client
            .post(self.config().token_endpoint())
            .form(&build_authorization_code_token_request_form(
                self.config(),
                code,
                &pending.verifier,
            ))
            .send()
            .await?;

        let response = extract_authentication_error(response)
            .await
            .map_err(map_authorization_code_error)?;

        let token_response: TokenResponse = response.json().await?;
        debug!("Got token response for authorization code flow: {:?}", token_response);

        let token = AccessToken::from_response(token_response, None, now_millis());
        self.storage().set_json(TOKEN_STORAGE_KEY, &token)?;
        self.storage().remove(VERIFIER_STORAGE_KEY)?;

        Ok(token)
    }

    /// Extracts the code and state from the URL the user was redirected to and [completes the
    /// authorization](Self::handle_callback).
    ///
    /// If the user denied access, the pending authorization is dropped along with returning an
    /// [AuthorizationDenied-error](Error::AuthorizationDenied).
    pub async fn handle_callback_url(&self, callback_url: &str) -> Result<AccessToken> {
        let (code, state) = match parse_callback_url(callback_url) {
            Ok(params) => params,
            Err(err @ Error::AuthorizationDenied(_)) => {
                self.storage().remove(VERIFIER_STORAGE_KEY)?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        self.handle_callback(&code, &state).await
    }

    /// Returns the stored access token, if any. An unreadable stored token is discarded.
    pub fn stored_token(&self) -> Result<Option<AccessToken>> {
        let Some(blob) = self.storage().get(TOKEN_STORAGE_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str(&blob) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                warn!("Discarding unreadable stored access token: {}", err);
                self.storage().remove(TOKEN_STORAGE_KEY)?;
                Ok(None)
            }
        }
    }

    /// Requests a new access token with the given token's refresh token and stores it.
    pub async fn refresh_access_token(&self, token: &AccessToken) -> Result<AccessToken> {
        debug!(
            "Attempting to refresh access token with refresh token: {}",
            token.refresh_token
        );

        let response = self
            .http_client
            .post(self.config().token_endpoint())
            .form(&build_refresh_token_request_form(self.config(), &token.refresh_token))
            .send()
            .await?;

        let response = extract_authentication_error(response)
            .await
            .map_err(map_refresh_token_error)?;

        let token_response: TokenResponse = response.json().await?;
        debug!("Got token response for refreshing access token: {:?}", token_response);

        let refreshed = AccessToken::from_response(token_response, Some(token.refresh_token.clone()), now_millis());
        self.storage().set_json(TOKEN_STORAGE_KEY, &refreshed)?;

        Ok(refreshed)
    }

    /// Forgets the stored session and any pending authorization.
    pub fn logout(&self) -> Result<()> {
        debug!("Removing stored session");

        self.storage().remove(TOKEN_STORAGE_KEY)?;
        self.storage().remove(VERIFIER_STORAGE_KEY)
    }
}

#[async_trait]
impl<S> Authenticator for PkceAuthenticator<S>
where
    S: TokenStorage,
{
    async fn authenticate(&self) -> Result<AuthenticationResponse> {
        let Some(token) = self.stored_token()? else {
            debug!("No stored access token");
            return Ok(AuthenticationResponse::unauthenticated());
        };

        if !token.is_expired() {
            return Ok(AuthenticationResponse::authenticated(token));
        }

        let _refresh_guard = self.inner.refresh_lock.lock().await;

        // another caller may have refreshed the token while we waited for the lock
        let Some(token) = self.stored_token()? else {
            debug!("Stored access token removed while waiting to refresh");
            return Ok(AuthenticationResponse::unauthenticated());
        };

        if !token.is_expired() {
            debug!("Stored access token already refreshed");
            return Ok(AuthenticationResponse::authenticated(token));
        }

        debug!("Stored access token expired, attempting to refresh");
        match self.refresh_access_token(&token).await {
            Ok(refreshed) => Ok(AuthenticationResponse::authenticated(refreshed)),

            Err(err @ Error::InvalidRefreshToken(_)) => {
                // the session can't be recovered. dropping it lets the login page show instead of bouncing back home.
                // a token stored since then with a different refresh token is left alone
                let still_rejected = self
                    .stored_token()?
                    .map_or(false, |stored| stored.refresh_token == token.refresh_token);

                if still_rejected {
                    warn!("Refresh token rejected, removing stored session");
                    self.storage().remove(TOKEN_STORAGE_KEY)?;
                }

                Err(err)
            }

            Err(err) => Err(err),
        }
    }
}

fn build_authorize_url(config: &SpotifyConfig, pending: &PendingAuthorization) -> Result<String> {
    let scopes = config.scopes_string();
    let pkce_challenge = pkce_challenge(&pending.verifier);

    debug!(
        "Using PKCE extension with verifier: {} and challenge: {}",
        pending.verifier, pkce_challenge
    );

    let mut query_params = vec![
        ("response_type", "code"),
        ("client_id", config.get_client_id()),
        ("redirect_uri", config.get_redirect_uri()),
        ("state", pending.state.as_str()),
        ("code_challenge_method", "S256"),
        ("code_challenge", pkce_challenge.as_str()),
        ("show_dialog", if config.get_show_dialog() { "true" } else { "false" }),
    ];

    if !scopes.is_empty() {
        query_params.push(("scope", scopes.as_str()));
    }

    let authorize_url = Url::parse_with_params(config.authorize_endpoint(), &query_params)?;
    Ok(authorize_url.into())
}

fn build_authorization_code_token_request_form<'a>(
    config: &'a SpotifyConfig,
    code: &'a str,
    verifier: &'a str,
) -> Vec<(&'a str, &'a str)> {
    vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", config.get_redirect_uri()),
        ("client_id", config.get_client_id()),
        ("code_verifier", verifier),
    ]
}

fn build_refresh_token_request_form<'a>(config: &'a SpotifyConfig, refresh_token: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", config.get_client_id()),
    ]
}

fn parse_callback_url(callback_url: &str) -> Result<(String, String)> {
    let url = Url::parse(callback_url)?;

    let mut code = None;
    let mut state = None;

    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "error" => return Err(Error::AuthorizationDenied(value.into_owned())),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok((
        code.ok_or(Error::MissingCallbackParameter("code"))?,
        state.ok_or(Error::MissingCallbackParameter("state"))?,
    ))
}
