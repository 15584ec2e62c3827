//! SQLite-backed storage for users, items and sessions.
//!
//! Tables:
//! - `users`: id, email (UNIQUE), password, created_at
//! - `items`: id, title, user_id
//! - `sessions`: token_hash, user_id, created_at, expires_at

use super::{
    IdentityStore, Item, ItemId, ItemStore, SessionRecord, SessionStore, StoreError, StoreResult,
    User, UserId,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Single-connection SQLite store. Writers are serialized by the mutex and
/// SQLite's own locking; there is no in-process caching of rows.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn)
    }

    /// Create an in-memory store (for tests and throwaway runs).
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_items_user ON items(user_id);

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Count registered users.
    #[cfg(test)]
    pub(crate) fn user_count(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl IdentityStore for SqliteStore {
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, email, password, created_at FROM users WHERE email = ?1",
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, email, password, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn insert_user(&self, email: &str, password_hash: &str) -> StoreResult<User> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (email, password, created_at) VALUES (?1, ?2, ?3)",
            params![email, password_hash, now],
        );

        match result {
            Ok(_) => Ok(User {
                id: conn.last_insert_rowid(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: now,
            }),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, email, password, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

impl ItemStore for SqliteStore {
    fn list_items_by_user(&self, user_id: UserId) -> StoreResult<Vec<Item>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, title, user_id FROM items WHERE user_id = ?1 ORDER BY id")?;
        let items = stmt
            .query_map(params![user_id], |row| {
                Ok(Item {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    user_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn insert_item(&self, title: &str, user_id: UserId) -> StoreResult<Item> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO items (title, user_id) VALUES (?1, ?2)",
            params![title, user_id],
        )?;
        Ok(Item {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
            user_id,
        })
    }

    fn update_item_title(
        &self,
        item_id: ItemId,
        user_id: UserId,
        title: &str,
    ) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE items SET title = ?1 WHERE id = ?2 AND user_id = ?3",
            params![title, item_id, user_id],
        )?;
        Ok(updated > 0)
    }

    fn delete_item(&self, item_id: ItemId, user_id: UserId) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM items WHERE id = ?1 AND user_id = ?2",
            params![item_id, user_id],
        )?;
        Ok(deleted > 0)
    }
}

impl SessionStore for SqliteStore {
    fn insert_session(&self, token_hash: &str, record: &SessionRecord) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token_hash,
                record.user_id,
                record.created_at,
                record.expires_at
            ],
        )?;
        Ok(())
    }

    fn find_session(&self, token_hash: &str, now: i64) -> StoreResult<Option<SessionRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT user_id, created_at, expires_at
                 FROM sessions
                 WHERE token_hash = ?1 AND expires_at > ?2",
                params![token_hash, now],
                |row| {
                    Ok(SessionRecord {
                        user_id: row.get(0)?,
                        created_at: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(deleted > 0)
    }

    fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted as u64)
    }

    fn delete_expired_sessions(&self, now: i64) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![now],
        )?;
        Ok(deleted as u64)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("daylist.db")).unwrap();
        (tmp, store)
    }

    #[test]
    fn insert_and_find_user() {
        let (_tmp, store) = test_store();

        let user = store.insert_user("alice@example.com", "hash").unwrap();
        assert!(user.id > 0);

        let by_email = store.find_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email, user);

        let by_id = store.find_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");

        assert!(store.find_user_by_id(9999).unwrap().is_none());
        assert!(store.find_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn email_lookup_is_case_sensitive() {
        let (_tmp, store) = test_store();

        store.insert_user("Alice@example.com", "hash").unwrap();
        assert!(store.find_user_by_email("alice@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (_tmp, store) = test_store();

        store.insert_user("alice@example.com", "hash").unwrap();
        let err = store.insert_user("alice@example.com", "other").unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        assert_eq!(store.user_count().unwrap(), 1);
    }

    #[test]
    fn list_users_in_id_order() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.insert_user("a@example.com", "h").unwrap();
        store.insert_user("b@example.com", "h").unwrap();
        let emails: Vec<_> = store
            .list_users()
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn items_are_scoped_to_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alice = store.insert_user("alice@example.com", "h").unwrap();
        let bob = store.insert_user("bob@example.com", "h").unwrap();

        let item = store.insert_item("Buy milk", alice.id).unwrap();
        assert_eq!(item.user_id, alice.id);

        assert_eq!(store.list_items_by_user(alice.id).unwrap(), vec![item.clone()]);
        assert!(store.list_items_by_user(bob.id).unwrap().is_empty());

        // Another user's id cannot touch the row
        assert!(!store.update_item_title(item.id, bob.id, "Hijacked").unwrap());
        assert!(!store.delete_item(item.id, bob.id).unwrap());
        assert_eq!(store.list_items_by_user(alice.id).unwrap()[0].title, "Buy milk");

        assert!(store.update_item_title(item.id, alice.id, "Buy oat milk").unwrap());
        assert_eq!(
            store.list_items_by_user(alice.id).unwrap()[0].title,
            "Buy oat milk"
        );
        assert!(store.delete_item(item.id, alice.id).unwrap());
        assert!(store.list_items_by_user(alice.id).unwrap().is_empty());
    }

    #[test]
    fn session_rows_respect_expiry() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.insert_user("alice@example.com", "h").unwrap();

        let record = SessionRecord {
            user_id: user.id,
            created_at: 100,
            expires_at: 200,
        };
        store.insert_session("hash_a", &record).unwrap();

        assert!(store.find_session("hash_a", 150).unwrap().is_some());
        assert!(store.find_session("hash_a", 200).unwrap().is_none());
        assert!(store.find_session("unknown", 150).unwrap().is_none());

        assert_eq!(store.delete_expired_sessions(250).unwrap(), 1);
        assert!(!store.delete_session("hash_a").unwrap());
    }

    #[test]
    fn delete_user_sessions_revokes_all() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.insert_user("alice@example.com", "h").unwrap();
        let record = SessionRecord {
            user_id: user.id,
            created_at: 0,
            expires_at: i64::MAX,
        };
        store.insert_session("t1", &record).unwrap();
        store.insert_session("t2", &record).unwrap();

        assert_eq!(store.delete_user_sessions(user.id).unwrap(), 2);
        assert!(store.find_session("t1", 1).unwrap().is_none());
    }
}
