use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// bcrypt work factor for stored password hashes.
pub const BCRYPT_COST: u32 = 10;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Reset tokens are valid for this many minutes after being issued.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// SHA-256 hex digest under which a reset token is stored.
pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// A freshly issued password reset token.
///
/// Only `hash` is persisted; `raw` is sent to the user.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub raw: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let raw = hex::encode(rand::random::<[u8; 20]>());
        Self {
            hash: hash_reset_token(&raw),
            raw,
            expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}
