//! Email + password authentication and registration.

use super::{AuthError, AuthResult, CredentialHasher};
use crate::store::{IdentityStore, User};
use std::sync::Arc;

/// Verifies local credentials against the identity store.
pub struct LocalAuthenticator {
    users: Arc<dyn IdentityStore>,
    hasher: CredentialHasher,
}

impl LocalAuthenticator {
    pub fn new(users: Arc<dyn IdentityStore>, hasher: CredentialHasher) -> Self {
        Self { users, hasher }
    }

    /// Authenticate by email + password. Returns the `User` on success.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email)?;
        let Some(user) = self.users.find_user_by_email(email)? else {
            tracing::debug!(email, "Local login for unknown email");
            return Err(AuthError::UserNotFound);
        };

        // The sentinel is not a bcrypt string; never hand it to the hasher.
        if user.is_federated_only() {
            tracing::info!(user_id = user.id, "Local login refused for federated-only account");
            return Err(AuthError::InvalidCredentials);
        }

        if !self.hasher.verify(password, &user.password_hash).await? {
            tracing::info!(user_id = user.id, "Local login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Register a new password-capable account.
    ///
    /// The existence pre-check gives a fast answer; the store's unique constraint
    /// is what actually rejects a concurrent duplicate.
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email)?;
        if self.users.find_user_by_email(email)?.is_some() {
            tracing::info!(email, "Registration for already registered email");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash(password).await?;
        let user = self.users.insert_user(email, &password_hash)?;
        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }
}

/// Trim surrounding whitespace; the stored email is otherwise kept verbatim.
pub(crate) fn normalize_email(email: &str) -> AuthResult<&str> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidInput("email cannot be empty".into()));
    }
    Ok(trimmed)
}
