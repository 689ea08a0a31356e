// Login session: set on successful login, cleared on logout

use crate::models::{User, now_ms};
use eyre::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The identity a request handler acts on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub logged_in_at: i64,
}

impl Session {
    /// Start a fresh session for an authenticated user
    pub fn start(user: &User) -> Self {
        Self {
            token: uuid::Uuid::now_v7().to_string(),
            user_id: user.id,
            username: user.username.clone(),
            logged_in_at: now_ms(),
        }
    }

    /// Login time formatted for display, in UTC
    pub fn since(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.logged_in_at)
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "an unknown time".to_string())
    }
}

/// JSON file that carries a session between process runs
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing or unreadable file means logged out.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).context("Failed to read session file")?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = ?self.path, error = ?e, "Ignoring corrupt session file");
                Ok(None)
            }
        }
    }

    /// Persist the session, replacing any previous one
    pub fn save(&self, session: &Session) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .context("Failed to open session file for writing")?;

        // Acquire exclusive lock before truncating
        file.lock_exclusive().context("Failed to acquire file lock")?;
        file.set_len(0)?;

        let json = serde_json::to_string_pretty(session)?;
        writeln!(file, "{}", json)?;
        file.sync_all()?;

        debug!(path = ?self.path, user_id = session.user_id, "Saved session");
        // Lock is automatically released when file is dropped
        Ok(())
    }

    /// Remove the stored session. Clearing twice is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = ?self.path, "Cleared session");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}
