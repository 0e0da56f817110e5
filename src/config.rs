//! Application credentials and the OAuth parameters used when authorizing the user.
//!
//! The configuration is usually read from the process environment with [SpotifyConfig::from_env], which also loads a
//! `.env` file from the working directory if one exists:
//!
//! ```text
//! CLIENT_ID=0123456789abcdef0123456789abcdef
//! CLIENT_SECRET=fedcba9876543210fedcba9876543210
//! REDIRECT_URI=http://localhost:5173/auth/callback
//! SCOPE=user-read-private user-read-email streaming
//! ```

use const_format::concatcp;
use log::debug;

use crate::{
    error::{Error, Result},
    scope::{Scope, ToScopesString, DEFAULT_SCOPES},
};

pub const CLIENT_ID_VAR: &str = "CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET";
pub const REDIRECT_URI_VAR: &str = "REDIRECT_URI";
pub const SCOPE_VAR: &str = "SCOPE";

const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com/";
pub(crate) const ACCOUNTS_AUTHORIZE_ENDPOINT: &str = concatcp!(ACCOUNTS_BASE_URL, "authorize");
pub(crate) const ACCOUNTS_API_TOKEN_ENDPOINT: &str = concatcp!(ACCOUNTS_BASE_URL, "api/token");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyConfig {
    client_id: String,
    // never sent in the PKCE flow; kept since the environment provides it
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: Vec<Scope>,
    show_dialog: bool,

    authorize_endpoint: String,
    token_endpoint: String,
}

impl SpotifyConfig {
    /// Returns a new configuration with the [default scopes](DEFAULT_SCOPES).
    pub fn new<C, R>(client_id: C, redirect_uri: R) -> Self
    where
        C: Into<String>,
        R: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.to_vec(),
            show_dialog: false,

            authorize_endpoint: ACCOUNTS_AUTHORIZE_ENDPOINT.to_owned(),
            token_endpoint: ACCOUNTS_API_TOKEN_ENDPOINT.to_owned(),
        }
    }

    /// Loads a `.env` file if present and reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(err) => debug!("Not loading a .env file: {}", err),
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration using the given variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(Error::MissingEnvironmentVariable(name))
        };

        let mut config = Self::new(required(CLIENT_ID_VAR)?, required(REDIRECT_URI_VAR)?);
        config.client_secret = lookup(CLIENT_SECRET_VAR).filter(|secret| !secret.is_empty());

        if let Some(scope) = lookup(SCOPE_VAR).filter(|scope| !scope.trim().is_empty()) {
            config.scopes = Scope::parse_list(&scope)?;
        }

        Ok(config)
    }

    pub fn client_secret<S>(self, client_secret: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            client_secret: Some(client_secret.into()),
            ..self
        }
    }

    pub fn scopes<I>(self, scopes: I) -> Self
    where
        I: IntoIterator<Item = Scope>,
    {
        Self {
            scopes: scopes.into_iter().collect(),
            ..self
        }
    }

    /// Set whether or not to force the user to approve the application again, if they've already done so.
    pub fn show_dialog(self, show_dialog: bool) -> Self {
        Self { show_dialog, ..self }
    }

    /// Points the authorize and token endpoints at a different accounts service, given its base URL with a trailing
    /// slash.
    pub fn accounts_base_url(self, base_url: &str) -> Self {
        Self {
            authorize_endpoint: format!("{base_url}authorize"),
            token_endpoint: format!("{base_url}api/token"),
            ..self
        }
    }

    pub fn get_client_id(&self) -> &str {
        &self.client_id
    }

    pub fn get_client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub fn get_redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn get_scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn get_show_dialog(&self) -> bool {
        self.show_dialog
    }

    pub(crate) fn scopes_string(&self) -> String {
        self.scopes.iter().copied().to_scopes_string()
    }

    pub(crate) fn authorize_endpoint(&self) -> &str {
        &self.authorize_endpoint
    }

    pub(crate) fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }
}
