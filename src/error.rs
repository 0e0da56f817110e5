use crate::model::error::AuthenticationErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("The given state does not match the original state")]
    AuthorizationCodeStateMismatch,
    #[error("There is no pending authorization to complete; a new authorize URL should be generated")]
    MissingPendingAuthorization,
    #[error("The user did not authorize the application: {0}")]
    AuthorizationDenied(String),
    #[error("The callback URL is missing the `{0}` query parameter")]
    MissingCallbackParameter(&'static str),
    #[error("The authorization code is invalid")]
    InvalidAuthorizationCode,
    #[error("The refresh token is invalid: {0}. The user should be reauthorized")]
    InvalidRefreshToken(String),

    #[error("Unhandled authentication error: {0:?}: {1}")]
    UnhandledAuthenticationError(AuthenticationErrorKind, String),

    #[error("Required environment variable {0} is not set")]
    MissingEnvironmentVariable(&'static str),
    #[error("Unknown authorization scope: {0}")]
    InvalidScope(String),

    #[error("No route matches the path {0}")]
    UnknownRoute(String),
    #[error("Navigation to {0} exceeded the redirect limit")]
    RedirectLoop(String),

    #[error("Token storage failure: {0}")]
    Storage(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
}
