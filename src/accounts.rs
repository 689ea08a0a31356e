// Account store: registration and login over the users table

use crate::models::User;
use crate::session::Session;
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Handle for user accounts, borrowed from a [`Store`](crate::Store)
pub struct Accounts<'a> {
    db: &'a Connection,
}

impl<'a> Accounts<'a> {
    pub(crate) fn new(db: &'a Connection) -> Self {
        Self { db }
    }

    /// Register a new user.
    ///
    /// Returns `false` without creating anything if the username is taken.
    pub fn register(&self, username: &str, password: &str) -> Result<bool> {
        validate_username(username)?;

        let result = self.db.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, hash_password(password)],
        );

        match result {
            Ok(_) => {
                info!(username, id = self.db.last_insert_rowid(), "Registered user");
                Ok(true)
            }
            Err(e) if is_unique_violation(&e) => {
                debug!(username, "Username already exists");
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to register user"),
        }
    }

    /// Look up the user whose username and password hash both match.
    ///
    /// Unknown users and wrong passwords are both `None`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self
            .db
            .query_row(
                "SELECT id, username FROM users WHERE username = ?1 AND password = ?2",
                params![username, hash_password(password)],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query users")?;

        debug!(username, found = user.is_some(), "authenticate");
        Ok(user)
    }

    /// Get a user by ID
    pub fn get(&self, user_id: i64) -> Result<Option<User>> {
        let user = self
            .db
            .query_row("SELECT id, username FROM users WHERE id = ?1", [user_id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            })
            .optional()?;
        Ok(user)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Record a session token issued at login
    pub fn open_session(&self, session: &Session) -> Result<()> {
        self.db
            .execute(
                "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![session.token, session.user_id, session.logged_in_at],
            )
            .context("Failed to record session")?;
        Ok(())
    }

    /// True if the token was issued by this database to this user, and the
    /// user still carries the same username.
    pub fn verify_session(&self, session: &Session) -> Result<bool> {
        let found: Option<String> = self
            .db
            .query_row(
                "SELECT u.username FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1 AND s.user_id = ?2",
                params![session.token, session.user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.as_deref() == Some(session.username.as_str()))
    }

    /// Forget a session token. Unknown tokens are ignored.
    pub fn close_session(&self, token: &str) -> Result<()> {
        self.db
            .execute("DELETE FROM sessions WHERE token = ?1", [token])
            .context("Failed to remove session")?;
        Ok(())
    }
}

/// SHA-256 of the password as lowercase hex
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(eyre!("Username cannot be empty or whitespace-only"));
    }
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
