//! # Tunegate
//!
//! Session handling for Spotify client front-ends: the OAuth 2.0 authorization code flow with PKCE, a persisted
//! session token, and a route table whose every navigation passes through a guard that keeps unauthenticated users on
//! the login page.
//!
//! The crate doesn't render anything. A front-end pushes paths into a [Router](router::Router) and renders whichever
//! [Route](router::Route) the navigation lands on.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tunegate::{
//!     auth::PkceAuthenticator,
//!     config::SpotifyConfig,
//!     guard::NavigationGuard,
//!     router::{Route, Router},
//!     storage::FileStorage,
//! };
//!
//! # async fn foo() -> tunegate::Result<()> {
//! // reads CLIENT_ID, CLIENT_SECRET, REDIRECT_URI and SCOPE, from a .env file if there is one
//! let config = SpotifyConfig::from_env()?;
//!
//! // the authenticator and the guard share one storage
//! let storage = Arc::new(FileStorage::new("session.json"));
//! let authenticator = PkceAuthenticator::new(config, Arc::clone(&storage));
//! let router = Router::new(NavigationGuard::new(authenticator.clone(), storage));
//!
//! // without a session, every page except the callback ends up at the login page
//! let navigation = router.push("/albums").await?;
//!
//! if navigation.route == Route::Login {
//!     println!("Log in at {}", authenticator.authorize_url()?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crate features
//!
//! - `native-tls` (default): use the system's TLS implementation for HTTPS.
//! - `rustls-tls`: use rustls for HTTPS.

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod model;
pub mod random;
pub mod router;
pub mod scope;
pub mod storage;

pub use crate::{
    error::{Error, Result},
    random::generate_random_string,
};

/// Re-exports the traits needed to work with authenticators and storages.
pub mod prelude {
    pub use crate::{
        auth::Authenticator,
        scope::ToScopesString,
        storage::{JsonStorageExt, TokenStorage},
    };
}
