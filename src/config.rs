// Store configuration loaded from config.yaml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const CONFIG_FILE: &str = "config.yaml";

/// Settings read from `<store>/config.yaml`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database filename inside the store directory
    pub db_file: String,
    /// Session filename inside the store directory
    pub session_file: String,
    /// How long a write waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_file: "todostore.db".to_string(),
            session_file: "session.json".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load config from the store directory, or defaults if there is none
    pub fn load(store_dir: &Path) -> Result<Self> {
        let path = store_dir.join(CONFIG_FILE);
        if !path.exists() {
            debug!(?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        debug!(?path, ?config, "Loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "db_file: other.db\n").unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.db_file, "other.db");
        assert_eq!(config.session_file, "session.json");
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "busy_timeout_ms: [not a number\n").unwrap();

        assert!(Config::load(temp.path()).is_err());
    }
}
