//! The navigation guard run before every route change.

use log::{debug, error};

use crate::{
    auth::Authenticator,
    router::{strip_query, CALLBACK_PATH, HOME_PATH, LOGIN_PATH},
    storage::{TokenStorage, TOKEN_STORAGE_KEY},
};

/// What to do with a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Let the navigation through.
    Proceed,
    /// Navigate to the given path instead.
    Redirect(String),
}

/// Keeps unauthenticated users on the login page and authenticated users off it.
///
/// - `/login` redirects home when a token is stored. Whether that token is still usable is left to the next
///   navigation.
/// - `/auth/callback` is always let through, since it is where the session gets established.
/// - Any other path requires [Authenticator::authenticate] to succeed, otherwise the user is sent to `/login`.
#[derive(Debug)]
pub struct NavigationGuard<A, S> {
    authenticator: A,
    storage: S,
}

impl<A, S> NavigationGuard<A, S>
where
    A: Authenticator,
    S: TokenStorage,
{
    /// `storage` should be the same storage the authenticator keeps its token in.
    pub fn new(authenticator: A, storage: S) -> Self {
        Self { authenticator, storage }
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    pub async fn before_each(&self, to: &str) -> GuardOutcome {
        let path = strip_query(to);

        if path == LOGIN_PATH {
            match self.storage.contains(TOKEN_STORAGE_KEY) {
                Ok(true) => {
                    debug!("Token present, leaving the login page");
                    GuardOutcome::Redirect(HOME_PATH.to_owned())
                }
                Ok(false) => GuardOutcome::Proceed,
                Err(err) => {
                    error!("Failed to read token storage: {}", err);
                    GuardOutcome::Proceed
                }
            }
        } else if path != CALLBACK_PATH {
            match self.authenticator.authenticate().await {
                Ok(response) if response.authenticated => GuardOutcome::Proceed,
                Ok(_) => {
                    debug!("Not authenticated, redirecting {} to the login page", path);
                    GuardOutcome::Redirect(LOGIN_PATH.to_owned())
                }
                Err(err) => {
                    error!("Authentication check failed: {}", err);
                    GuardOutcome::Redirect(LOGIN_PATH.to_owned())
                }
            }
        } else {
            GuardOutcome::Proceed
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        auth::AuthenticationResponse,
        error::{Error, Result},
        storage::MemoryStorage,
    };

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Script {
        Authenticated,
        Unauthenticated,
        Fails,
    }

    #[derive(Debug)]
    pub(crate) struct ScriptedAuthenticator {
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedAuthenticator {
        pub(crate) fn new(script: Script) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for ScriptedAuthenticator {
        async fn authenticate(&self) -> Result<AuthenticationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            match self.script {
                Script::Authenticated => Ok(AuthenticationResponse {
                    authenticated: true,
                    access_token: None,
                }),
                Script::Unauthenticated => Ok(AuthenticationResponse::unauthenticated()),
                Script::Fails => Err(Error::InvalidRefreshToken("revoked".to_owned())),
            }
        }
    }

    fn guard(
        script: Script,
        token_stored: bool,
    ) -> NavigationGuard<Arc<ScriptedAuthenticator>, MemoryStorage> {
        let storage = MemoryStorage::new();
        if token_stored {
            storage.set(TOKEN_STORAGE_KEY, "{}").unwrap();
        }

        NavigationGuard::new(Arc::new(ScriptedAuthenticator::new(script)), storage)
    }

    #[tokio::test]
    async fn login_with_stored_token_redirects_home() {
        for script in [Script::Authenticated, Script::Unauthenticated, Script::Fails] {
            let guard = guard(script, true);

            assert_eq!(guard.before_each("/login").await, GuardOutcome::Redirect("/".to_owned()));
            assert_eq!(
                guard.before_each("/login?next=%2Falbums").await,
                GuardOutcome::Redirect("/".to_owned())
            );
            assert_eq!(guard.authenticator().calls(), 0);
        }
    }

    #[tokio::test]
    async fn login_without_token_proceeds() {
        let guard = guard(Script::Unauthenticated, false);

        assert_eq!(guard.before_each("/login").await, GuardOutcome::Proceed);
        assert_eq!(guard.authenticator().calls(), 0);
    }

    #[tokio::test]
    async fn callback_always_proceeds() {
        for (script, token_stored) in [(Script::Unauthenticated, false), (Script::Fails, true)] {
            let guard = guard(script, token_stored);

            assert_eq!(
                guard.before_each("/auth/callback?code=abc&state=xyz").await,
                GuardOutcome::Proceed
            );
            assert_eq!(guard.authenticator().calls(), 0);
        }
    }

    #[tokio::test]
    async fn protected_paths_without_session_redirect_to_login() {
        let guard = guard(Script::Unauthenticated, false);

        for path in [
            "/",
            "/explore",
            "/albums",
            "/album/4aawyAB9vmqN3uQ7FjRGTy",
            "/artist/0TnOYISbd1XYRBk9myaseg",
            "/category/toplists",
            "/playlists",
            "/playlist/37i9dQZF1DXcBWIGoYBM5M",
            "/does/not/exist",
        ] {
            assert_eq!(
                guard.before_each(path).await,
                GuardOutcome::Redirect("/login".to_owned()),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn protected_paths_with_session_proceed() {
        let guard = guard(Script::Authenticated, true);

        assert_eq!(guard.before_each("/").await, GuardOutcome::Proceed);
        assert_eq!(guard.before_each("/explore").await, GuardOutcome::Proceed);
        assert_eq!(guard.authenticator().calls(), 2);
    }

    #[tokio::test]
    async fn failed_authentication_check_redirects_to_login() {
        let guard = guard(Script::Fails, true);

        assert_eq!(guard.before_each("/albums").await, GuardOutcome::Redirect("/login".to_owned()));
        assert_eq!(guard.authenticator().calls(), 1);
    }

    #[derive(Debug)]
    struct UnreadableStorage;

    impl TokenStorage for UnreadableStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "session file not readable").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "session file not writable").into())
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.set(key, "")
        }
    }

    #[tokio::test]
    async fn unreadable_storage_shows_login() {
        let guard = NavigationGuard::new(ScriptedAuthenticator::new(Script::Authenticated), UnreadableStorage);

        assert_eq!(guard.before_each("/login").await, GuardOutcome::Proceed);
        assert_eq!(guard.authenticator().calls(), 0);

        // other paths only consult the authenticator
        assert_eq!(guard.before_each("/explore").await, GuardOutcome::Proceed);
        assert_eq!(guard.authenticator().calls(), 1);
    }
}
