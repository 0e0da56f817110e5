//! Objects exchanged with the Spotify accounts service and persisted in token storage.

pub mod error;
pub mod token;
