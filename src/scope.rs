//! OAuth authorization scopes the application may request from the user.

use std::{fmt::Display, str::FromStr};

use crate::error::Error;

/// The scopes requested when none are configured.
pub const DEFAULT_SCOPES: [Scope; 9] = [
    Scope::UserReadPlaybackState,
    Scope::UserModifyPlaybackState,
    Scope::UserReadCurrentlyPlaying,
    Scope::Streaming,
    Scope::UserFollowRead,
    Scope::UserTopRead,
    Scope::UserReadRecentlyPlayed,
    Scope::UserReadEmail,
    Scope::UserReadPrivate,
];

/// Joins a collection of scopes into the space-separated form the authorize endpoint expects.
pub trait ToScopesString {
    fn to_scopes_string(self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    UgcImageUpload,
    UserModifyPlaybackState,
    UserReadPlaybackState,
    UserReadCurrentlyPlaying,
    UserFollowModify,
    UserFollowRead,
    UserReadRecentlyPlayed,
    UserReadPlaybackPosition,
    UserTopRead,
    PlaylistReadCollaborative,
    PlaylistModifyPublic,
    PlaylistReadPrivate,
    PlaylistModifyPrivate,
    AppRemoteControl,
    Streaming,
    UserReadEmail,
    UserReadPrivate,
    UserLibraryModify,
    UserLibraryRead,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::UgcImageUpload => "ugc-image-upload",
            Scope::UserModifyPlaybackState => "user-modify-playback-state",
            Scope::UserReadPlaybackState => "user-read-playback-state",
            Scope::UserReadCurrentlyPlaying => "user-read-currently-playing",
            Scope::UserFollowModify => "user-follow-modify",
            Scope::UserFollowRead => "user-follow-read",
            Scope::UserReadRecentlyPlayed => "user-read-recently-played",
            Scope::UserReadPlaybackPosition => "user-read-playback-position",
            Scope::UserTopRead => "user-top-read",
            Scope::PlaylistReadCollaborative => "playlist-read-collaborative",
            Scope::PlaylistModifyPublic => "playlist-modify-public",
            Scope::PlaylistReadPrivate => "playlist-read-private",
            Scope::PlaylistModifyPrivate => "playlist-modify-private",
            Scope::AppRemoteControl => "app-remote-control",
            Scope::Streaming => "streaming",
            Scope::UserReadEmail => "user-read-email",
            Scope::UserReadPrivate => "user-read-private",
            Scope::UserLibraryModify => "user-library-modify",
            Scope::UserLibraryRead => "user-library-read",
        }
    }

    /// Parses a space-separated scope list, such as the one given in the `SCOPE` environment variable.
    pub fn parse_list(list: &str) -> Result<Vec<Scope>, Error> {
        list.split_whitespace().map(str::parse).collect()
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scope = match s {
            "ugc-image-upload" => Scope::UgcImageUpload,
            "user-modify-playback-state" => Scope::UserModifyPlaybackState,
            "user-read-playback-state" => Scope::UserReadPlaybackState,
            "user-read-currently-playing" => Scope::UserReadCurrentlyPlaying,
            "user-follow-modify" => Scope::UserFollowModify,
            "user-follow-read" => Scope::UserFollowRead,
            "user-read-recently-played" => Scope::UserReadRecentlyPlayed,
            "user-read-playback-position" => Scope::UserReadPlaybackPosition,
            "user-top-read" => Scope::UserTopRead,
            "playlist-read-collaborative" => Scope::PlaylistReadCollaborative,
            "playlist-modify-public" => Scope::PlaylistModifyPublic,
            "playlist-read-private" => Scope::PlaylistReadPrivate,
            "playlist-modify-private" => Scope::PlaylistModifyPrivate,
            "app-remote-control" => Scope::AppRemoteControl,
            "streaming" => Scope::Streaming,
            "user-read-email" => Scope::UserReadEmail,
            "user-read-private" => Scope::UserReadPrivate,
            "user-library-modify" => Scope::UserLibraryModify,
            "user-library-read" => Scope::UserLibraryRead,

            other => return Err(Error::InvalidScope(other.to_owned())),
        };

        Ok(scope)
    }
}

impl<I> ToScopesString for I
where
    I: IntoIterator<Item = Scope>,
{
    fn to_scopes_string(self) -> String {
        self.into_iter()
            .map(|scope| scope.to_string())
            .collect::<Vec<String>>()
            .join(" ")
    }
}
