//! Password hashing with bcrypt.
//!
//! Hashing and verification are CPU-bound and run on the blocking thread pool so
//! they never stall other requests on the async runtime.

use super::{AuthError, AuthResult};

/// Default bcrypt cost factor (2^10 rounds).
pub const DEFAULT_COST: u32 = 10;

/// bcrypt only consumes the first 72 bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// One-way salted password hasher with a fixed cost.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl CredentialHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a plaintext password with a fresh random salt.
    pub async fn hash(&self, plaintext: &str) -> AuthResult<String> {
        validate_password(plaintext)?;
        let plaintext = plaintext.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || {
            bcrypt::hash(plaintext, cost).map_err(|e| AuthError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::Hashing(format!("hashing task failed: {e}")))?
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; only a malformed hash or a runtime failure is an error.
    pub async fn verify(&self, plaintext: &str, hashed: &str) -> AuthResult<bool> {
        // bcrypt ignores bytes past the limit; no stored hash can match a longer input.
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        let plaintext = plaintext.to_string();
        let hashed = hashed.to_string();

        tokio::task::spawn_blocking(move || {
            bcrypt::verify(plaintext, &hashed).map_err(|e| AuthError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::Hashing(format!("verification task failed: {e}")))?
    }
}

/// Reject passwords bcrypt cannot represent faithfully.
pub fn validate_password(plaintext: &str) -> AuthResult<()> {
    if plaintext.is_empty() {
        return Err(AuthError::InvalidInput("password cannot be empty".into()));
    }
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidInput(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}
