// Data models for TodoStore

use serde::{Deserialize, Serialize};

/// A registered account. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// A to-do item owned by exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub task: String,
    pub done: bool,
}

impl Task {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            task: row.get(2)?,
            done: row.get(3)?,
        })
    }
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms() {
        let ts = now_ms();
        assert!(ts > 0);
        // Should be reasonable timestamp (after year 2020)
        assert!(ts > 1_600_000_000_000);
    }

    #[test]
    fn test_task_serialization() {
        let task = Task {
            id: 7,
            user_id: 1,
            task: "buy milk".to_string(),
            done: false,
        };

        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, r#"{"id":7,"user_id":1,"task":"buy milk","done":false}"#);
    }

    #[test]
    fn test_user_serialization_has_no_password() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        let deserialized: User = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, user);
    }
}
