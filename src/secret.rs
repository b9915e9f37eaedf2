//! Token secret generation and hashing.
//!
//! Clients hold the cleartext value; the store only ever sees
//! `hash_token(value, instance_secret)`.

use rand::Rng;
use sha2::{Digest, Sha512};

/// Length of a generated token value.
pub const TOKEN_LENGTH: usize = 72;

/// Generate a new random token value.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-512 of `token || instance_secret`, lowercase hex. This is the value
/// persisted in the `token` column and used for lookups.
pub fn hash_token(token: &str, instance_secret: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(token.as_bytes());
    hasher.update(instance_secret.as_bytes());
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}
