//! Salted password hashing with Argon2id.
//!
//! `Argon2::default()` is Argon2id with m=19 MiB, t=2, p=1, the OWASP
//! minimum recommendation. Both functions are CPU-heavy; call them from
//! `spawn_blocking` in async contexts.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{CoreError, CoreResult};

/// Hashes `password` with a fresh random salt, returning a PHC string.
pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::PasswordHash(format!("failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC hash.
///
/// The comparison is constant-time inside `argon2`. An unparsable stored
/// hash is an error, a mismatch is `Ok(false)`.
pub fn verify_password(stored_hash: &str, password: &str) -> CoreResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| CoreError::PasswordHash(format!("invalid stored hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
