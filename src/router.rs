//! The application's route table and a [Router] that runs the [navigation guard](crate::guard::NavigationGuard) on
//! every navigation.

use std::{fmt, sync::Mutex};

use log::debug;

use crate::{
    auth::Authenticator,
    error::{Error, Result},
    guard::{GuardOutcome, NavigationGuard},
    storage::TokenStorage,
};

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const CALLBACK_PATH: &str = "/auth/callback";

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Callback,
    Artist(String),
    Explore,
    Category(String),
    Albums,
    Album(String),
    Playlists,
    Playlist(String),
}

/// A completed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    /// The originally requested path, if the guard redirected elsewhere.
    pub redirected_from: Option<String>,
}

/// Resolves paths to [routes](Route) and guards every navigation.
#[derive(Debug)]
pub struct Router<A, S> {
    guard: NavigationGuard<A, S>,
    current: Mutex<Option<Route>>,
}

impl Route {
    /// Matches a path against the route table. The query string and fragment are ignored, as is a single trailing
    /// slash.
    pub fn resolve(path: &str) -> Option<Self> {
        let path = strip_query(path);
        let path = if path.len() > 1 {
            path.strip_suffix('/').unwrap_or(path)
        } else {
            path
        };

        let segments: Vec<&str> = path.strip_prefix('/')?.split('/').collect();

        let route = match segments.as_slice() {
            [""] => Route::Home,
            ["login"] => Route::Login,
            ["auth", "callback"] => Route::Callback,
            ["explore"] => Route::Explore,
            ["albums"] => Route::Albums,
            ["playlists"] => Route::Playlists,

            ["artist", id] if !id.is_empty() => Route::Artist((*id).to_owned()),
            ["category", id] if !id.is_empty() => Route::Category((*id).to_owned()),
            ["album", id] if !id.is_empty() => Route::Album((*id).to_owned()),
            ["playlist", id] if !id.is_empty() => Route::Playlist((*id).to_owned()),

            _ => return None,
        };

        Some(route)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::Login => "login",
            Route::Callback => "callback",
            Route::Artist(_) => "artist",
            Route::Explore => "explore",
            Route::Category(_) => "category",
            Route::Albums => "albums",
            Route::Album(_) => "album",
            Route::Playlists => "playlists",
            Route::Playlist(_) => "playlist",
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => HOME_PATH.to_owned(),
            Route::Login => LOGIN_PATH.to_owned(),
            Route::Callback => CALLBACK_PATH.to_owned(),
            Route::Artist(id) => format!("/artist/{id}"),
            Route::Explore => "/explore".to_owned(),
            Route::Category(id) => format!("/category/{id}"),
            Route::Albums => "/albums".to_owned(),
            Route::Album(id) => format!("/album/{id}"),
            Route::Playlists => "/playlists".to_owned(),
            Route::Playlist(id) => format!("/playlist/{id}"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl<A, S> Router<A, S>
where
    A: Authenticator,
    S: TokenStorage,
{
    pub fn new(guard: NavigationGuard<A, S>) -> Self {
        Self {
            guard,
            current: Mutex::new(None),
        }
    }

    pub fn guard(&self) -> &NavigationGuard<A, S> {
        &self.guard
    }

    /// The route of the last successful navigation.
    pub fn current(&self) -> Option<Route> {
        self.current.lock().expect("current route mutex poisoned").clone()
    }

    /// Navigates to the given path, following any redirects the guard makes.
    ///
    /// Fails with [RedirectLoop](Error::RedirectLoop) if the guard keeps redirecting, and with
    /// [UnknownRoute](Error::UnknownRoute) if the path it settles on isn't in the route table. The current route is
    /// left untouched on failure.
    pub async fn push(&self, path: &str) -> Result<Navigation> {
        let mut target = path.to_owned();
        let mut redirected = false;

        for _ in 0..=MAX_REDIRECTS {
            match self.guard.before_each(&target).await {
                GuardOutcome::Proceed => {
                    let route = Route::resolve(&target).ok_or_else(|| Error::UnknownRoute(target.clone()))?;
                    debug!("Navigated to {} ({})", route, route.name());

                    *self.current.lock().expect("current route mutex poisoned") = Some(route.clone());

                    return Ok(Navigation {
                        route,
                        redirected_from: redirected.then(|| path.to_owned()),
                    });
                }

                GuardOutcome::Redirect(next) => {
                    debug!("Guard redirected {} to {}", target, next);

                    target = next;
                    redirected = true;
                }
            }
        }

        Err(Error::RedirectLoop(path.to_owned()))
    }
}

/// Strips the query string and fragment from a path.
pub(crate) fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}
