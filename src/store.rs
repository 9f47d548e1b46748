use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::wizard::controller::{DraftStore, SavedDraft};
use crate::wizard::error::PersistenceError;

/// One draft row per session key, holding the whole draft.
pub struct SqliteDraftStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSetup {
    pub session_key: String,
    pub completed_at: String,
    pub saved: SavedDraft,
}

impl SqliteDraftStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// The workspace connection, shared with the student roster.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn completed(&self, session_key: &str) -> Result<Option<CompletedSetup>, PersistenceError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT payload, completed_at FROM completed_setups WHERE session_key = ?",
                [session_key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((payload, completed_at)) = row else {
            return Ok(None);
        };
        Ok(Some(CompletedSetup {
            session_key: session_key.to_string(),
            completed_at,
            saved: serde_json::from_str(&payload)?,
        }))
    }
}

impl DraftStore for SqliteDraftStore {
    fn load(&self, session_key: &str) -> Result<Option<SavedDraft>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM drafts WHERE session_key = ?",
                [session_key],
                |r| r.get(0),
            )
            .optional()?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    fn save(&self, session_key: &str, saved: &SavedDraft) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(saved)?;
        self.conn.execute(
            "INSERT INTO drafts(session_key, step, payload, updated_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(session_key) DO UPDATE SET
               step = excluded.step,
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            (
                session_key,
                saved.step.as_str(),
                &payload,
                Utc::now().to_rfc3339(),
            ),
        )?;
        debug!(session_key, step = %saved.step, bytes = payload.len(), "draft saved");
        Ok(())
    }

    fn complete(&self, session_key: &str, saved: &SavedDraft) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(saved)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO completed_setups(session_key, institution_name, payload, completed_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(session_key) DO UPDATE SET
               institution_name = excluded.institution_name,
               payload = excluded.payload,
               completed_at = excluded.completed_at",
            (
                session_key,
                saved.draft.institution.institution_name.trim(),
                &payload,
                Utc::now().to_rfc3339(),
            ),
        )?;
        tx.execute("DELETE FROM drafts WHERE session_key = ?", [session_key])?;
        tx.commit()?;
        debug!(session_key, "setup handed off; draft cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::wizard::model::Draft;
    use crate::wizard::WizardStep;

    fn store() -> SqliteDraftStore {
        let conn = Connection::open_in_memory().expect("open memory db");
        db::init_schema(&conn).expect("schema");
        SqliteDraftStore::new(conn)
    }

    #[test]
    fn save_overwrites_and_load_reads_back() {
        let s = store();
        assert!(s.load("k").expect("load").is_none());

        let mut saved = SavedDraft {
            step: WizardStep::Roles,
            completed_steps: vec![WizardStep::Registration],
            draft: Draft::default(),
        };
        s.save("k", &saved).expect("save");
        saved.step = WizardStep::AcademicYear;
        saved.completed_steps.push(WizardStep::Roles);
        s.save("k", &saved).expect("save again");

        assert_eq!(s.load("k").expect("load"), Some(saved));
    }

    #[test]
    fn complete_moves_draft_to_completed_setups() {
        let s = store();
        let mut saved = SavedDraft {
            step: WizardStep::Subject,
            completed_steps: Vec::new(),
            draft: Draft::default(),
        };
        saved.draft.institution.institution_name = "Springfield High".into();
        s.save("k", &saved).expect("save");

        saved.step = WizardStep::Complete;
        s.complete("k", &saved).expect("complete");
        assert!(s.load("k").expect("load").is_none());
        let done = s.completed("k").expect("completed").expect("row");
        assert_eq!(done.saved, saved);
        assert!(s.completed("other").expect("completed").is_none());
    }
}
