#![forbid(unsafe_code)]

use super::*;
use pl_core::ids::RootId;
use pl_core::model::WorkflowStatus;
use rusqlite::{OptionalExtension, params};

const ACTIVE_STATUSES: &str = "('in_progress','paused','awaiting_feedback')";

impl SqliteStore {
    /// Create a workflow in `not_started`. Fails with
    /// `DuplicateActiveWorkflow` when an active instance for the same
    /// (root, name) already exists; the check and the insert share one
    /// transaction so two racing creators cannot both succeed.
    pub fn create_workflow(
        &mut self,
        root: &RootId,
        request: CreateWorkflowRequest,
    ) -> Result<WorkflowRow, StoreError> {
        let CreateWorkflowRequest {
            name,
            context_summary_json,
            related_ids_json,
            event_payload_json,
        } = request;
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("workflow name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let active: i64 = tx.query_row(
            &format!(
                "SELECT COUNT(*) FROM workflows WHERE root = ?1 AND name = ?2 AND status IN {ACTIVE_STATUSES}"
            ),
            params![root.as_str(), name],
            |row| row.get(0),
        )?;
        if active > 0 {
            return Err(StoreError::DuplicateActiveWorkflow { name });
        }

        let seq = next_counter_tx(&tx, root.as_str(), "workflow_seq")?;
        let id = format!("WF-{seq:03}");
        let related_ids_json = related_ids_json.unwrap_or_else(|| "[]".to_string());

        tx.execute(
            r#"
            INSERT INTO workflows(root, id, revision, name, status, context_summary_json, related_ids_json, failure_reason, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9)
            "#,
            params![
                root.as_str(),
                id,
                0i64,
                name,
                WorkflowStatus::NotStarted.as_str(),
                context_summary_json,
                related_ids_json,
                now_ms,
                now_ms
            ],
        )?;
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(&id),
            "workflow.created",
            &event_payload_json,
        )?;
        tx.commit()?;

        Ok(WorkflowRow {
            id,
            revision: 0,
            name,
            status: WorkflowStatus::NotStarted,
            context_summary_json,
            related_ids_json,
            failure_reason: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn get_workflow(
        &self,
        root: &RootId,
        id: &str,
    ) -> Result<Option<WorkflowRow>, StoreError> {
        let row = self
            .conn()
            .query_row(
                r#"
                SELECT id, revision, name, status, context_summary_json, related_ids_json, failure_reason, created_at_ms, updated_at_ms
                FROM workflows
                WHERE root = ?1 AND id = ?2
                "#,
                params![root.as_str(), id],
                map_workflow_row,
            )
            .optional()?;
        row.map(finish_workflow_row).transpose()
    }

    /// Apply a validated status change. The caller (the state machine) has
    /// already checked the transition against the ladder; this method only
    /// guards the revision and persists the change atomically with its event.
    pub fn set_workflow_state(
        &mut self,
        root: &RootId,
        request: SetWorkflowStateRequest,
    ) -> Result<(i64, EventRow), StoreError> {
        let SetWorkflowStateRequest {
            id,
            expected_revision,
            status,
            context_summary_json,
            related_ids_json,
            failure_reason,
            event_type,
            event_payload_json,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;

        let revision: i64 = tx
            .query_row(
                "SELECT revision FROM workflows WHERE root = ?1 AND id = ?2",
                params![root.as_str(), &id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownId)?;
        check_revision(expected_revision, revision)?;

        let new_revision = revision + 1;
        tx.execute(
            r#"
            UPDATE workflows
            SET revision = ?3,
                status = ?4,
                context_summary_json = COALESCE(?5, context_summary_json),
                related_ids_json = COALESCE(?6, related_ids_json),
                failure_reason = COALESCE(?7, failure_reason),
                updated_at_ms = ?8
            WHERE root = ?1 AND id = ?2
            "#,
            params![
                root.as_str(),
                &id,
                new_revision,
                status.as_str(),
                context_summary_json,
                related_ids_json,
                failure_reason,
                now_ms
            ],
        )?;
        let event = insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(&id),
            &event_type,
            &event_payload_json,
        )?;
        tx.commit()?;
        Ok((new_revision, event))
    }

    /// Active workflow "save files" for context assembly, most recently
    /// touched first.
    pub fn list_active_workflows(
        &self,
        root: &RootId,
        limit: usize,
    ) -> Result<Vec<WorkflowRow>, StoreError> {
        let mut stmt = self.conn().prepare(&format!(
            r#"
            SELECT id, revision, name, status, context_summary_json, related_ids_json, failure_reason, created_at_ms, updated_at_ms
            FROM workflows
            WHERE root = ?1 AND status IN {ACTIVE_STATUSES}
            ORDER BY updated_at_ms DESC
            LIMIT ?2
            "#
        ))?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], map_workflow_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(finish_workflow_row(row?)?);
        }
        Ok(out)
    }

    pub fn find_workflow_by_name(
        &self,
        root: &RootId,
        name: &str,
    ) -> Result<Option<WorkflowRow>, StoreError> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    r#"
                    SELECT id, revision, name, status, context_summary_json, related_ids_json, failure_reason, created_at_ms, updated_at_ms
                    FROM workflows
                    WHERE root = ?1 AND name = ?2 AND status IN {ACTIVE_STATUSES}
                    ORDER BY updated_at_ms DESC
                    LIMIT 1
                    "#
                ),
                params![root.as_str(), name],
                map_workflow_row,
            )
            .optional()?;
        row.map(finish_workflow_row).transpose()
    }
}

type RawWorkflowRow = (
    String,
    i64,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    i64,
    i64,
);

fn map_workflow_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawWorkflowRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn finish_workflow_row(raw: RawWorkflowRow) -> Result<WorkflowRow, StoreError> {
    let (id, revision, name, status, context_summary_json, related_ids_json, failure_reason, created, updated) =
        raw;
    Ok(WorkflowRow {
        id,
        revision,
        name,
        status: parse_workflow_status(&status)?,
        context_summary_json,
        related_ids_json,
        failure_reason,
        created_at_ms: created,
        updated_at_ms: updated,
    })
}
