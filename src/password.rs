use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use once_cell::sync::Lazy;

/// Hash compared against when the account does not exist, so that an unknown
/// username costs the same bcrypt work as a wrong password.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash("cerberus-dummy-credential", DEFAULT_COST).ok());

pub fn hash_password(password: &str) -> Result<String> {
    hash(password, DEFAULT_COST).context("Failed to hash password")
}

/// Constant-time check of `password` against a stored bcrypt hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    verify(password, password_hash).context("Failed to verify password hash")
}

/// Burn one bcrypt verification without a real account behind it
pub fn verify_dummy(password: &str) {
    if let Some(dummy) = DUMMY_HASH.as_deref() {
        let _ = verify(password, dummy);
    }
}
