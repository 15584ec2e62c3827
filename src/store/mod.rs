//! Storage adapters consumed by the auth core and the item handlers.
//!
//! The core only ever talks to these traits:
//! - [`IdentityStore`]: user rows, keyed by email (unique) and id
//! - [`ItemStore`]: list items, always scoped by owning user id
//! - [`SessionStore`]: server-held session rows, keyed by token hash
//!
//! [`SqliteStore`] implements all three over a single SQLite database.

pub mod sqlite;

pub use sqlite::SqliteStore;

use serde::Serialize;

/// Durable user identifier.
pub type UserId = i64;

/// Durable item identifier.
pub type ItemId = i64;

/// Stored password value for accounts created through a federated provider.
/// It is never a valid bcrypt string, so it can never verify locally.
pub const FEDERATED_PASSWORD_SENTINEL: &str = "google";

/// A registered user.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

impl User {
    /// Whether this account was provisioned by a federated login and has no local password.
    pub fn is_federated_only(&self) -> bool {
        self.password_hash == FEDERATED_PASSWORD_SENTINEL
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A list item owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub user_id: UserId,
}

/// A server-side session row. The plaintext token never reaches storage.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("record already exists")]
    Duplicate,
    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// User records. The adapter is the sole writer of user rows.
pub trait IdentityStore: Send + Sync {
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Insert a user. Must fail with [`StoreError::Duplicate`] atomically when the
    /// email is already taken, even if a concurrent caller raced the existence check.
    fn insert_user(&self, email: &str, password_hash: &str) -> StoreResult<User>;

    fn list_users(&self) -> StoreResult<Vec<User>>;
}

/// Item records. Every mutating call carries the owner id, and rows owned by
/// someone else are left untouched.
pub trait ItemStore: Send + Sync {
    fn list_items_by_user(&self, user_id: UserId) -> StoreResult<Vec<Item>>;

    fn insert_item(&self, title: &str, user_id: UserId) -> StoreResult<Item>;

    /// Returns `false` when no item with that id belongs to `user_id`.
    fn update_item_title(&self, item_id: ItemId, user_id: UserId, title: &str)
        -> StoreResult<bool>;

    /// Returns `false` when no item with that id belongs to `user_id`.
    fn delete_item(&self, item_id: ItemId, user_id: UserId) -> StoreResult<bool>;
}

/// Session rows keyed by the SHA-256 hash of the session token.
pub trait SessionStore: Send + Sync {
    fn insert_session(&self, token_hash: &str, record: &SessionRecord) -> StoreResult<()>;

    /// Look up a session that is still valid at `now` (unix seconds).
    fn find_session(&self, token_hash: &str, now: i64) -> StoreResult<Option<SessionRecord>>;

    fn delete_session(&self, token_hash: &str) -> StoreResult<bool>;

    fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<u64>;

    fn delete_expired_sessions(&self, now: i64) -> StoreResult<u64>;
}
