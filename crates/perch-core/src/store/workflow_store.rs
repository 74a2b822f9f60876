use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::WorkflowError;
use crate::models::{WorkflowDefinition, WorkflowInput, WorkflowPatch, WorkflowSettings, WorkflowStep};

#[derive(Clone)]
pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        space_id: &str,
        input: WorkflowInput,
    ) -> Result<WorkflowDefinition, WorkflowError> {
        let id = uuid::Uuid::new_v4().to_string();
        let workflow = WorkflowDefinition::new(id, space_id.to_string(), input);
        let w = workflow.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, space_id, name, steps, settings, last_run_at, last_conversation_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        w.id,
                        w.space_id,
                        w.name,
                        serde_json::to_string(&w.steps).unwrap_or_else(|_| "[]".to_string()),
                        w.settings
                            .as_ref()
                            .and_then(|s| serde_json::to_string(s).ok()),
                        w.last_run_at.map(|t| t.timestamp_millis()),
                        w.last_conversation_id,
                        w.created_at.timestamp_millis(),
                        w.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(workflow)
    }

    pub async fn get(
        &self,
        space_id: &str,
        workflow_id: &str,
    ) -> Result<Option<WorkflowDefinition>, WorkflowError> {
        let sid = space_id.to_string();
        let id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, space_id, name, steps, settings, last_run_at, last_conversation_id, created_at, updated_at
                     FROM workflows WHERE space_id = ?1 AND id = ?2",
                )?;
                stmt.query_row(rusqlite::params![sid, id], |row| Ok(row_to_workflow(row)))
                    .optional()
            })
            .await
    }

    pub async fn list(&self, space_id: &str) -> Result<Vec<WorkflowDefinition>, WorkflowError> {
        let sid = space_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, space_id, name, steps, settings, last_run_at, last_conversation_id, created_at, updated_at
                     FROM workflows WHERE space_id = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![sid], |row| Ok(row_to_workflow(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Apply a partial update. Returns the updated definition, or `None` if
    /// the workflow doesn't exist in this space.
    pub async fn update(
        &self,
        space_id: &str,
        workflow_id: &str,
        patch: WorkflowPatch,
    ) -> Result<Option<WorkflowDefinition>, WorkflowError> {
        let Some(mut workflow) = self.get(space_id, workflow_id).await? else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            workflow.name = name;
        }
        if let Some(steps) = patch.steps {
            workflow.steps = steps;
        }
        if let Some(settings) = patch.settings {
            workflow.settings = Some(settings);
        }
        workflow.updated_at = Utc::now();

        let w = workflow.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE workflows SET name = ?1, steps = ?2, settings = ?3, updated_at = ?4
                     WHERE space_id = ?5 AND id = ?6",
                    rusqlite::params![
                        w.name,
                        serde_json::to_string(&w.steps).unwrap_or_else(|_| "[]".to_string()),
                        w.settings
                            .as_ref()
                            .and_then(|s| serde_json::to_string(s).ok()),
                        w.updated_at.timestamp_millis(),
                        w.space_id,
                        w.id,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(Some(workflow))
    }

    pub async fn delete(&self, space_id: &str, workflow_id: &str) -> Result<bool, WorkflowError> {
        let sid = space_id.to_string();
        let id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "DELETE FROM workflows WHERE space_id = ?1 AND id = ?2",
                    rusqlite::params![sid, id],
                )?;
                Ok(n > 0)
            })
            .await
    }

    /// Persist run metadata when a run starts.
    pub async fn record_run(
        &self,
        space_id: &str,
        workflow_id: &str,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let sid = space_id.to_string();
        let id = workflow_id.to_string();
        let conv = conversation_id.to_string();
        let ts = at.timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE workflows SET last_run_at = ?1, last_conversation_id = ?2, updated_at = ?1
                     WHERE space_id = ?3 AND id = ?4",
                    rusqlite::params![ts, conv, sid, id],
                )?;
                Ok(())
            })
            .await
    }
}

use rusqlite::Row;

fn row_to_workflow(row: &Row<'_>) -> WorkflowDefinition {
    let steps_str: String = row.get(3).unwrap_or_default();
    let steps: Vec<WorkflowStep> = serde_json::from_str(&steps_str).unwrap_or_default();
    let settings: Option<WorkflowSettings> = row
        .get::<_, Option<String>>(4)
        .unwrap_or(None)
        .and_then(|s| serde_json::from_str(&s).ok());
    let last_run_ms: Option<i64> = row.get(5).unwrap_or(None);
    let created_ms: i64 = row.get(7).unwrap_or(0);
    let updated_ms: i64 = row.get(8).unwrap_or(0);

    WorkflowDefinition {
        id: row.get(0).unwrap_or_default(),
        space_id: row.get(1).unwrap_or_default(),
        name: row.get(2).unwrap_or_default(),
        steps,
        settings,
        last_run_at: last_run_ms.and_then(DateTime::from_timestamp_millis),
        last_conversation_id: row.get(6).unwrap_or(None),
        created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp_millis(updated_ms).unwrap_or_else(Utc::now),
    }
}
