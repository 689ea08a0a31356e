// SQLite-backed store shared by the account and task components

use crate::accounts::Accounts;
use crate::config::Config;
use crate::tasks::Tasks;
use eyre::{Context, Result, eyre};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory created under the store path
pub const STORE_DIR: &str = ".todostore";

struct Migration {
    version: u32,
    sql: &'static str,
}

// Version 1 matches the layout of databases created by earlier releases, so
// those open without changes.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE,
                password TEXT
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                task TEXT NOT NULL,
                done BOOLEAN NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users (id)
            );
        "#,
    },
    Migration {
        version: 2,
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id);
        "#,
    },
    Migration {
        version: 3,
        sql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id)
            );
        "#,
    },
];

/// Persistent to-do store: one SQLite connection shared by the account and
/// task components.
pub struct Store {
    base_path: Option<PathBuf>,
    db: Connection,
}

impl Store {
    /// Open or create a store at the given path
    ///
    /// The store will be created in a `.todostore` subdirectory of the given path.
    /// An optional `config.yaml` in that directory is honoured.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (store, _config) = Self::open_with_config(path)?;
        Ok(store)
    }

    /// Same as [`Store::open`], also returning the settings that were loaded
    pub fn open_with_config<P: AsRef<Path>>(path: P) -> Result<(Self, Config)> {
        let base_path = path.as_ref().join(STORE_DIR);

        // Create directory if it doesn't exist
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let config = Config::load(&base_path)?;
        let store = Self::open_dir(base_path, &config)?;
        Ok((store, config))
    }

    /// Open a store directory that already exists, with explicit settings
    pub fn open_dir(base_path: PathBuf, config: &Config) -> Result<Self> {
        let db_path = base_path.join(&config.db_file);
        debug!(?db_path, "Opening database");
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut store = Self {
            base_path: Some(base_path),
            db,
        };
        store.bootstrap(config)?;
        store.create_gitignore(config)?;

        Ok(store)
    }

    /// Open a throwaway store that lives only in memory
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let mut store = Self { base_path: None, db };
        store.bootstrap(&Config::default())?;
        Ok(store)
    }

    /// Get the base path of this store (`None` for in-memory stores)
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    /// User registration and login
    pub fn accounts(&self) -> Accounts<'_> {
        Accounts::new(&self.db)
    }

    /// Per-user task records
    pub fn tasks(&self) -> Tasks<'_> {
        Tasks::new(&self.db)
    }

    /// Current schema version of the open database
    pub fn schema_version(&self) -> Result<u32> {
        let version = self
            .db
            .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))?;
        u32::try_from(version).map_err(|_| eyre!("Database schema version {} is not valid", version))
    }

    fn bootstrap(&mut self, config: &Config) -> Result<()> {
        self.db
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.db.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        self.apply_migrations()
    }

    /// Apply pending schema migrations in one transaction
    fn apply_migrations(&mut self) -> Result<()> {
        let current = self.schema_version()?;
        let latest = latest_version();

        if current > latest {
            return Err(eyre!(
                "Database schema version {} is newer than supported {}",
                current,
                latest
            ));
        }
        if current == latest {
            debug!(version = current, "Schema up to date");
            return Ok(());
        }

        let tx = self.db.transaction()?;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            debug!(version = migration.version, "Applying migration");
            tx.execute_batch(migration.sql)
                .with_context(|| format!("Migration {} failed", migration.version))?;
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        }
        tx.commit()?;

        info!(from = current, to = latest, "Migrated database schema");
        Ok(())
    }

    /// Create .gitignore file
    fn create_gitignore(&self, config: &Config) -> Result<()> {
        let Some(base_path) = &self.base_path else {
            return Ok(());
        };
        let gitignore_path = base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(
                gitignore_path,
                format!(
                    "{db}\n{db}-shm\n{db}-wal\n{session}\n",
                    db = config.db_file,
                    session = config.session_file
                ),
            )?;
        }
        Ok(())
    }
}

/// Latest schema version this binary knows about
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_open_creates_directory() {
        let temp = TempDir::new().unwrap();

        let _store = Store::open(temp.path()).unwrap();
        let store_path = temp.path().join(".todostore");
        assert!(store_path.exists());
        assert!(store_path.join("todostore.db").exists());
        assert!(store_path.join(".gitignore").exists());
    }

    #[test]
    fn test_gitignore_lists_db_and_session() {
        let temp = TempDir::new().unwrap();
        let _store = Store::open(temp.path()).unwrap();

        let content = fs::read_to_string(temp.path().join(".todostore/.gitignore")).unwrap();
        assert!(content.contains("todostore.db\n"));
        assert!(content.contains("session.json\n"));
    }

    #[test]
    fn test_open_honours_config_db_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(STORE_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "db_file: custom.db\n").unwrap();

        let _store = Store::open(temp.path()).unwrap();
        assert!(dir.join("custom.db").exists());
        assert!(!dir.join("todostore.db").exists());
    }

    #[test]
    fn test_migrations_applied() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), latest_version());

        let tables: Vec<String> = store
            .db()
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'tasks') ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(tables, vec!["tasks".to_string(), "users".to_string()]);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp = TempDir::new().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            assert!(store.accounts().register("alice", "pw1").unwrap());
        }

        let store = Store::open(temp.path()).unwrap();
        assert!(store.accounts().authenticate("alice", "pw1").unwrap().is_some());
        assert_eq!(store.schema_version().unwrap(), latest_version());
    }

    #[test]
    fn test_newer_schema_rejected() {
        let temp = TempDir::new().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            store.db().execute_batch("PRAGMA user_version = 99;").unwrap();
        }

        let err = Store::open(temp.path()).err().unwrap();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_negative_schema_rejected() {
        let temp = TempDir::new().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            store.db().execute_batch("PRAGMA user_version = -1;").unwrap();
        }

        let err = Store::open(temp.path()).err().unwrap();
        assert!(err.to_string().contains("-1 is not valid"));
    }

    #[test]
    fn test_open_with_config_returns_settings() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(STORE_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "session_file: who.json\n").unwrap();

        let (store, config) = Store::open_with_config(temp.path()).unwrap();
        assert_eq!(config.session_file, "who.json");
        assert_eq!(store.base_path(), Some(dir.as_path()));
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let store = Store::open_in_memory().unwrap();
        let enabled: i64 = store
            .db()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
