use serde::Deserialize;

use crate::error::Error;

/// Body of a 400 response from the accounts service token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct AuthenticationErrorResponse {
    pub error: AuthenticationErrorKind,
    #[serde(default)]
    pub error_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,

    #[serde(other)]
    Other,
}

impl AuthenticationErrorResponse {
    pub fn into_unhandled_error(self) -> Error {
        Error::UnhandledAuthenticationError(self.error, self.error_description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grant_response() {
        let response: AuthenticationErrorResponse =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#).unwrap();

        assert_eq!(response.error, AuthenticationErrorKind::InvalidGrant);
        assert!(matches!(
            response.into_unhandled_error(),
            Error::UnhandledAuthenticationError(AuthenticationErrorKind::InvalidGrant, description)
                if description == "Refresh token revoked"
        ));
    }

    #[test]
    fn unknown_error_kind() {
        let response: AuthenticationErrorResponse =
            serde_json::from_str(r#"{"error":"temporarily_unavailable"}"#).unwrap();

        assert_eq!(response.error, AuthenticationErrorKind::Other);
        assert!(response.error_description.is_empty());
    }
}
