use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::StoreError;

/// The agent's mutable scratchpad: mission, status, and task list.
/// Single row, overwritten wholesale by the present-state tools.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PresentState {
    pub mission: Option<String>,
    pub status: Option<String>,
    pub tasks: Vec<Task>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

#[derive(Clone)]
pub struct PresentRepo {
    db: Database,
}

impl PresentRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Read the single row; defaults when never written.
    pub fn get(&self) -> Result<PresentState, StoreError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT mission, status, tasks FROM present_state WHERE id = 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, Option<String>>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .ok();

            match row {
                Some((mission, status, tasks_json)) => Ok(PresentState {
                    mission,
                    status,
                    tasks: serde_json::from_str(&tasks_json).unwrap_or_default(),
                }),
                None => Ok(PresentState::default()),
            }
        })
    }

    pub fn set_mission(&self, mission: Option<&str>) -> Result<(), StoreError> {
        self.with_row(|conn, now| {
            conn.execute(
                "UPDATE present_state SET mission = ?1, updated_at = ?2 WHERE id = 1",
                rusqlite::params![mission, now],
            )?;
            Ok(())
        })
    }

    pub fn set_status(&self, status: Option<&str>) -> Result<(), StoreError> {
        self.with_row(|conn, now| {
            conn.execute(
                "UPDATE present_state SET status = ?1, updated_at = ?2 WHERE id = 1",
                rusqlite::params![status, now],
            )?;
            Ok(())
        })
    }

    /// Replace the task list wholesale.
    pub fn set_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let tasks_json = serde_json::to_string(tasks)?;
        self.with_row(|conn, now| {
            conn.execute(
                "UPDATE present_state SET tasks = ?1, updated_at = ?2 WHERE id = 1",
                rusqlite::params![tasks_json, now],
            )?;
            Ok(())
        })
    }

    /// Ensure the single row exists, then run the update.
    fn with_row<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&rusqlite::Connection, &str) -> Result<(), StoreError>,
    {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO present_state (id, tasks, updated_at) VALUES (1, '[]', ?1)
                 ON CONFLICT(id) DO NOTHING",
                rusqlite::params![now],
            )?;
            f(conn, &now)
        })
    }
}
