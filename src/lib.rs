// TodoStore - Multi-user to-do lists backed by SQLite

pub mod accounts;
pub mod app;
pub mod config;
pub mod models;
pub mod session;
pub mod store;
pub mod tasks;

// Re-export main types for convenience
pub use accounts::Accounts;
pub use app::{App, Outcome, TaskView};
pub use config::Config;
pub use models::{Task, User, now_ms};
pub use session::{Session, SessionFile};
pub use store::Store;
pub use tasks::Tasks;

// Re-export rusqlite for CLI use
pub use rusqlite;
