use anyhow::{Context, Result};

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password")
}

/// One-off password handed out by an admin reset; the user is expected to
/// change it after logging in.
pub fn generate_temporary_password() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("Tmp-{}", &raw[..12])
}
