use rusqlite::OptionalExtension;

use crate::database::Database;
use crate::error::StoreError;

/// Key/value settings persisted with the database, such as the session id,
/// so a restarted process resumes the same session.
#[derive(Clone)]
pub struct SessionConfigRepo {
    db: Database,
}

pub const SESSION_ID_KEY: &str = "session_id";

impl SessionConfigRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.db.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM session_config WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_config (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, value],
            )?;
            Ok(())
        })
    }

    /// Return the persisted session id, minting and storing one on first
    /// call.
    pub fn get_or_create_session_id(
        &self,
        ids: &miriad_core::ids::IdService,
    ) -> Result<miriad_core::ids::SessionId, StoreError> {
        if let Some(existing) = self.get(SESSION_ID_KEY)? {
            return Ok(miriad_core::ids::SessionId::from_raw(existing));
        }
        let id = ids.session_id();
        self.set(SESSION_ID_KEY, id.as_str())?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miriad_core::ids::IdService;

    #[test]
    fn get_missing_key() {
        let repo = SessionConfigRepo::new(Database::in_memory().unwrap());
        assert!(repo.get("nope").unwrap().is_none());
    }

    #[test]
    fn set_and_overwrite() {
        let repo = SessionConfigRepo::new(Database::in_memory().unwrap());
        repo.set("model", "claude-opus-4-6").unwrap();
        repo.set("model", "claude-sonnet-4-5").unwrap();
        assert_eq!(
            repo.get("model").unwrap().as_deref(),
            Some("claude-sonnet-4-5")
        );
    }

    #[test]
    fn session_id_is_stable() {
        let repo = SessionConfigRepo::new(Database::in_memory().unwrap());
        let ids = IdService::new();
        let first = repo.get_or_create_session_id(&ids).unwrap();
        let second = repo.get_or_create_session_id(&ids).unwrap();
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("session_"));
    }
}
