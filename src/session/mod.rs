//! Server-side sessions.
//!
//! A session binds a user id to an opaque random token:
//! - the client holds `"{token}.{hmac}"` in an HTTP-only cookie
//! - the store holds only SHA-256(token), the user id and a fixed expiry
//!
//! Every request re-reads the session row and re-resolves the user by id, so
//! there is no cached identity that can drift from the user table.

pub mod transport;

pub use transport::CookieSettings;

use crate::auth::{AuthError, AuthResult};
use crate::config::SessionConfig;
use crate::store::{IdentityStore, SessionRecord, SessionStore, User, UserId};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
        }
    }
}

/// A freshly established session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Signed value to place in the session cookie. Only revealed once.
    pub cookie_value: String,
    pub expires_at: i64,
}

/// Owns the session lifecycle: establish, resolve, terminate, purge.
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn IdentityStore>,
    mac: Hmac<Sha256>,
    ttl_secs: i64,
    cookies: CookieSettings,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn IdentityStore>,
        config: &SessionConfig,
    ) -> anyhow::Result<Self> {
        let mac = <Hmac<Sha256> as Mac>::new_from_slice(config.secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid session secret: {e}"))?;
        let ttl_secs = i64::try_from(config.ttl_secs).unwrap_or(i64::MAX);
        Ok(Self {
            sessions,
            users,
            mac,
            ttl_secs,
            cookies: CookieSettings {
                name: config.cookie_name.clone(),
                max_age_secs: ttl_secs,
                secure: config.secure_cookie,
            },
        })
    }

    pub fn cookies(&self) -> &CookieSettings {
        &self.cookies
    }

    /// Bind an authenticated user to a new session.
    pub fn establish(&self, user: &User) -> AuthResult<IssuedSession> {
        self.establish_at(user, now_secs())
    }

    fn establish_at(&self, user: &User, now: i64) -> AuthResult<IssuedSession> {
        let token = generate_token();
        let record = SessionRecord {
            user_id: user.id,
            created_at: now,
            expires_at: now.saturating_add(self.ttl_secs),
        };
        self.sessions
            .insert_session(&hash_token(&token), &record)
            .map_err(AuthError::Session)?;

        tracing::debug!(user_id = user.id, expires_at = record.expires_at, "Session established");
        Ok(IssuedSession {
            cookie_value: self.sign(&token),
            expires_at: record.expires_at,
        })
    }

    /// Restore the principal for a session cookie value.
    ///
    /// Returns `Ok(None)` for anything that does not authenticate: a bad signature,
    /// an unknown or expired token, or a user that no longer exists.
    pub fn resolve(&self, cookie_value: &str) -> AuthResult<Option<Principal>> {
        self.resolve_at(cookie_value, now_secs())
    }

    fn resolve_at(&self, cookie_value: &str, now: i64) -> AuthResult<Option<Principal>> {
        let Some(token) = self.verify(cookie_value) else {
            return Ok(None);
        };
        let token_hash = hash_token(token);

        let Some(record) = self
            .sessions
            .find_session(&token_hash, now)
            .map_err(AuthError::Session)?
        else {
            return Ok(None);
        };

        match self.users.find_user_by_id(record.user_id)? {
            Some(user) => Ok(Some(Principal::from(&user))),
            None => {
                tracing::warn!(user_id = record.user_id, "Session references a missing user");
                self.sessions
                    .delete_session(&token_hash)
                    .map_err(AuthError::Session)?;
                Ok(None)
            }
        }
    }

    /// Terminate the session behind a cookie value. Store failures propagate.
    /// Returns `false` when there was no live session to remove.
    pub fn terminate(&self, cookie_value: &str) -> AuthResult<bool> {
        let Some(token) = self.verify(cookie_value) else {
            return Ok(false);
        };
        let removed = self
            .sessions
            .delete_session(&hash_token(token))
            .map_err(AuthError::Session)?;
        if removed {
            tracing::debug!("Session terminated");
        }
        Ok(removed)
    }

    /// Revoke every session of a user.
    pub fn terminate_all(&self, user_id: UserId) -> AuthResult<u64> {
        self.sessions
            .delete_user_sessions(user_id)
            .map_err(AuthError::Session)
    }

    /// Delete expired session rows.
    pub fn purge_expired(&self) -> AuthResult<u64> {
        self.sessions
            .delete_expired_sessions(now_secs())
            .map_err(AuthError::Session)
    }

    fn sign(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        format!("{token}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Check the signature and return the bare token.
    fn verify<'a>(&self, cookie_value: &'a str) -> Option<&'a str> {
        let (token, signature) = cookie_value.split_once('.')?;
        let expected = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&expected).ok()?;
        Some(token)
    }
}

/// Generate a random session token (hex-encoded).
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a session token (single SHA-256 pass).
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Current Unix epoch in seconds.
fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

// ── Tests ───────────────────────────────────────────────────────────
