//! Credential store
//!
//! A single SQLite table of `(username, password)` pairs, where the password
//! column holds a hex digest and never plaintext. Usernames are unique by
//! primary key; that constraint is the only race safety net for concurrent
//! signups, which matches the low-concurrency setting this service targets.

use std::path::Path;

use rusqlite::Connection;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

/// A stored user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    /// Hex digest of the password. Never plaintext.
    pub password_hash: String,
}

/// File-backed table of username/password-hash pairs.
pub struct CredentialStore {
    conn: Connection,
}

impl CredentialStore {
    /// Open (or create) the store at the given path and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.ensure_schema()?;
        tracing::debug!("credential store opened at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Idempotently create the users table. Run once at startup.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS users(
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Insert a new user. Fails with [`Error::DuplicateUser`] if the username
    /// is already present.
    pub fn insert_user(&self, username: &str, password_hash: &str) -> Result<()> {
        let result = self.conn.execute(
            "INSERT INTO users(username, password) VALUES (?1, ?2)",
            [username, password_hash],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateUser)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by username and digest.
    ///
    /// Returns the record only when both match. The digest comparison is
    /// constant-time so the lookup leaks nothing about how close a guess was.
    pub fn find_user(&self, username: &str, password_hash: &str) -> Result<Option<UserRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT password FROM users WHERE username = ?1")?;
        let stored: Option<String> = stmt
            .query_row([username], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match stored {
            Some(stored_hash)
                if stored_hash.as_bytes().ct_eq(password_hash.as_bytes()).into() =>
            {
                Ok(Some(UserRecord {
                    username: username.to_string(),
                    password_hash: stored_hash,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Number of stored users. Used by tests to assert insert side effects.
    pub fn user_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
