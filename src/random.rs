//! Random strings for the OAuth state parameter and the PKCE code verifier.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

pub(crate) const RANDOM_STATE_LENGTH: usize = 16;
pub(crate) const PKCE_VERIFIER_LENGTH: usize = 128; // maximum Spotify allows

/// Returns a string of exactly `length` characters, each drawn uniformly from `A-Z`, `a-z` and `0-9` using the
/// thread-local cryptographically secure generator.
///
/// ```
/// let state = tunegate::generate_random_string(16);
///
/// assert_eq!(state.len(), 16);
/// assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Derives the `S256` code challenge for a PKCE code verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_string_has_requested_length() {
        for length in [0, 1, 16, 43, 128, 1000] {
            let generated = generate_random_string(length);

            assert_eq!(generated.len(), length);
            assert!(generated.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn random_strings_differ() {
        assert_ne!(
            generate_random_string(RANDOM_STATE_LENGTH),
            generate_random_string(RANDOM_STATE_LENGTH)
        );
    }

    #[test]
    fn challenge_matches_rfc_7636_example() {
        // appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(pkce_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn challenge_is_url_safe() {
        let challenge = pkce_challenge(&generate_random_string(PKCE_VERIFIER_LENGTH));

        assert_eq!(challenge.len(), 43);
        assert!(challenge
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
