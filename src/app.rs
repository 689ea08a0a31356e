// Request handler: maps user actions onto the stores through an explicit session

use crate::models::Task;
use crate::session::{Session, SessionFile};
use crate::store::Store;
use eyre::Result;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// User-facing result of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Outcome {
    Success(String),
    Info(String),
    Warning(String),
    Error(String),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Success(m) | Outcome::Info(m) | Outcome::Warning(m) | Outcome::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// What the logged-in user sees: a heading and their tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub username: String,
    pub tasks: Vec<Task>,
}

impl TaskView {
    pub fn heading(&self) -> String {
        format!("{}'s To-Do List", self.username)
    }
}

const NOT_LOGGED_IN: &str = "Please login first.";

pub struct App {
    store: Store,
    sessions: SessionFile,
    current: Option<Session>,
}

impl App {
    /// Open the store under `path` and restore any saved session
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (store, config) = Store::open_with_config(path)?;
        let base_path = store.base_path().unwrap_or(Path::new("."));
        let sessions = SessionFile::new(base_path.join(&config.session_file));
        Self::new(store, sessions)
    }

    /// Restore the saved session if this store issued it. Anything else is
    /// discarded and the app starts logged out.
    pub fn new(store: Store, sessions: SessionFile) -> Result<Self> {
        let current = match sessions.load()? {
            Some(session) if store.accounts().verify_session(&session)? => {
                debug!(username = %session.username, "Restored session");
                Some(session)
            }
            Some(session) => {
                let user_exists = store.accounts().get(session.user_id)?.is_some();
                warn!(
                    username = %session.username,
                    user_id = session.user_id,
                    user_exists,
                    "Discarding session not issued by this store"
                );
                sessions.clear()?;
                None
            }
            None => None,
        };
        Ok(Self {
            store,
            sessions,
            current,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub fn sign_up(&self, username: &str, password: &str) -> Result<Outcome> {
        if username.trim().is_empty() {
            return Ok(Outcome::Warning("Please choose a username.".to_string()));
        }

        if self.store.accounts().register(username, password)? {
            Ok(Outcome::Success("Account created! Please login.".to_string()))
        } else {
            Ok(Outcome::Error("Username already exists, choose another.".to_string()))
        }
    }

    /// Authenticate and, on success, replace the current session
    pub fn login(&mut self, username: &str, password: &str) -> Result<Outcome> {
        let Some(user) = self.store.accounts().authenticate(username, password)? else {
            return Ok(Outcome::Error("Invalid username or password".to_string()));
        };

        if let Some(previous) = self.current.take() {
            self.store.accounts().close_session(&previous.token)?;
        }

        let session = Session::start(&user);
        self.store.accounts().open_session(&session)?;
        self.sessions.save(&session)?;
        info!(username = %user.username, user_id = user.id, "Logged in");
        self.current = Some(session);

        Ok(Outcome::Success(format!("Welcome back, {}!", user.username)))
    }

    pub fn logout(&mut self) -> Result<Outcome> {
        self.sessions.clear()?;
        match self.current.take() {
            Some(session) => {
                self.store.accounts().close_session(&session.token)?;
                info!(username = %session.username, "Logged out");
                Ok(Outcome::Success("Logged out.".to_string()))
            }
            None => Ok(Outcome::Info("Not logged in.".to_string())),
        }
    }

    pub fn whoami(&self) -> Outcome {
        match &self.current {
            Some(session) => Outcome::Info(format!(
                "Logged in as {} (since {})",
                session.username,
                session.since()
            )),
            None => Outcome::Info("Not logged in.".to_string()),
        }
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// The session user's list, or `None` when logged out
    pub fn task_view(&self) -> Result<Option<TaskView>> {
        let Some(session) = &self.current else {
            return Ok(None);
        };

        let tasks = self.store.tasks().list(session.user_id)?;
        Ok(Some(TaskView {
            username: session.username.clone(),
            tasks,
        }))
    }

    pub fn add_task(&self, text: &str) -> Result<Outcome> {
        let Some(session) = &self.current else {
            return Ok(Outcome::Error(NOT_LOGGED_IN.to_string()));
        };
        if text.trim().is_empty() {
            return Ok(Outcome::Warning("Please enter a task before adding.".to_string()));
        }

        self.store.tasks().add(session.user_id, text)?;
        Ok(Outcome::Success(format!("Task '{}' added!", text)))
    }

    pub fn set_done(&self, task_id: i64, done: bool) -> Result<Outcome> {
        let Some(session) = &self.current else {
            return Ok(Outcome::Error(NOT_LOGGED_IN.to_string()));
        };
        if !self.owns_task(session, task_id)? {
            return Ok(not_in_list(task_id));
        }

        self.store.tasks().set_done(task_id, done)?;
        let state = if done { "done" } else { "not done" };
        Ok(Outcome::Success(format!("Marked #{} as {}.", task_id, state)))
    }

    pub fn delete_task(&self, task_id: i64) -> Result<Outcome> {
        let Some(session) = &self.current else {
            return Ok(Outcome::Error(NOT_LOGGED_IN.to_string()));
        };
        if !self.owns_task(session, task_id)? {
            return Ok(not_in_list(task_id));
        }

        self.store.tasks().delete(task_id)?;
        Ok(Outcome::Success(format!("Deleted task #{}.", task_id)))
    }

    pub fn clear_all(&self) -> Result<Outcome> {
        let Some(session) = &self.current else {
            return Ok(Outcome::Error(NOT_LOGGED_IN.to_string()));
        };

        if self.store.tasks().clear(session.user_id)? == 0 {
            return Ok(Outcome::Info("No tasks to clear.".to_string()));
        }
        Ok(Outcome::Success("All tasks cleared!".to_string()))
    }

    fn owns_task(&self, session: &Session, task_id: i64) -> Result<bool> {
        let owned = self
            .store
            .tasks()
            .get(task_id)?
            .is_some_and(|task| task.user_id == session.user_id);
        if !owned {
            debug!(task_id, user_id = session.user_id, "Task not in session user's list");
        }
        Ok(owned)
    }
}

fn not_in_list(task_id: i64) -> Outcome {
    Outcome::Error(format!("No task #{} in your list.", task_id))
}
