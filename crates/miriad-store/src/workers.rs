use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use miriad_core::ids::WorkerId;

use crate::database::Database;
use crate::error::StoreError;

/// A background maintenance run. Rows exist for observability and crash
/// diagnosis only; nothing reads them on the hot path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub kind: WorkerKind,
    pub status: WorkerStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerKind {
    TemporalCompact,
    LtmConsolidate,
    LtmReflect,
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemporalCompact => write!(f, "temporal-compact"),
            Self::LtmConsolidate => write!(f, "ltm-consolidate"),
            Self::LtmReflect => write!(f, "ltm-reflect"),
        }
    }
}

impl std::str::FromStr for WorkerKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temporal-compact" => Ok(Self::TemporalCompact),
            "ltm-consolidate" => Ok(Self::LtmConsolidate),
            "ltm-reflect" => Ok(Self::LtmReflect),
            other => Err(format!("unknown worker kind: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WorkerStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown worker status: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct WorkerRepo {
    db: Database,
}

impl WorkerRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a new running worker.
    pub fn create(&self, id: WorkerId, kind: WorkerKind) -> Result<Worker, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO workers (id, type, status, started_at) VALUES (?1, ?2, 'running', ?3)",
                rusqlite::params![id.as_str(), kind.to_string(), now],
            )?;
            Ok(Worker {
                id: id.clone(),
                kind,
                status: WorkerStatus::Running,
                started_at: now.clone(),
                completed_at: None,
                error: None,
            })
        })
    }

    pub fn complete(&self, id: &WorkerId) -> Result<(), StoreError> {
        self.transition(id, WorkerStatus::Completed, None)
    }

    pub fn fail(&self, id: &WorkerId, error: &str) -> Result<(), StoreError> {
        self.transition(id, WorkerStatus::Failed, Some(error))
    }

    fn transition(
        &self,
        id: &WorkerId,
        status: WorkerStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE workers SET status = ?1, completed_at = ?2, error = ?3 WHERE id = ?4",
                rusqlite::params![status.to_string(), now, error, id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("worker {id}")));
            }
            Ok(())
        })
    }

    pub fn get(&self, id: &WorkerId) -> Result<Option<Worker>, StoreError> {
        self.db.with_conn(|conn| {
            let worker = conn
                .query_row(
                    "SELECT id, type, status, started_at, completed_at, error
                     FROM workers WHERE id = ?1",
                    [id.as_str()],
                    worker_from_row,
                )
                .optional()?;
            Ok(worker)
        })
    }

    pub fn list(&self) -> Result<Vec<Worker>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, type, status, started_at, completed_at, error
                 FROM workers ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], worker_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn worker_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Worker> {
    let kind: String = row.get(1)?;
    let status: String = row.get(2)?;
    Ok(Worker {
        id: WorkerId::from_raw(row.get::<_, String>(0)?),
        kind: kind.parse().unwrap_or(WorkerKind::TemporalCompact),
        status: status.parse().unwrap_or(WorkerStatus::Failed),
        started_at: row.get(3)?,
        completed_at: row.get(4)?,
        error: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use miriad_core::ids::IdService;

    fn setup() -> (WorkerRepo, IdService) {
        (WorkerRepo::new(Database::in_memory().unwrap()), IdService::new())
    }

    #[test]
    fn create_and_complete() {
        let (repo, ids) = setup();
        let worker = repo
            .create(ids.worker_id(), WorkerKind::TemporalCompact)
            .unwrap();
        assert_eq!(worker.status, WorkerStatus::Running);
        assert!(worker.completed_at.is_none());

        repo.complete(&worker.id).unwrap();
        let fetched = repo.get(&worker.id).unwrap().unwrap();
        assert_eq!(fetched.status, WorkerStatus::Completed);
        assert!(fetched.completed_at.is_some());
        assert!(fetched.error.is_none());
    }

    #[test]
    fn fail_records_error() {
        let (repo, ids) = setup();
        let worker = repo
            .create(ids.worker_id(), WorkerKind::LtmConsolidate)
            .unwrap();
        repo.fail(&worker.id, "model timed out").unwrap();

        let fetched = repo.get(&worker.id).unwrap().unwrap();
        assert_eq!(fetched.status, WorkerStatus::Failed);
        assert_eq!(fetched.error.as_deref(), Some("model timed out"));
    }

    #[test]
    fn transition_on_missing_worker_fails() {
        let (repo, _) = setup();
        let err = repo
            .complete(&WorkerId::from_raw("worker_ghost"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn list_in_id_order() {
        let (repo, ids) = setup();
        let a = repo
            .create(ids.worker_id(), WorkerKind::TemporalCompact)
            .unwrap();
        let b = repo.create(ids.worker_id(), WorkerKind::LtmReflect).unwrap();

        let workers = repo.list().unwrap();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].id, a.id);
        assert_eq!(workers[1].id, b.id);
    }

    #[test]
    fn kind_roundtrip() {
        for kind in [
            WorkerKind::TemporalCompact,
            WorkerKind::LtmConsolidate,
            WorkerKind::LtmReflect,
        ] {
            let s = kind.to_string();
            let parsed: WorkerKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }
}
