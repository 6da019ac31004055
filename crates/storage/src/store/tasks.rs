#![forbid(unsafe_code)]

use super::*;
use pl_core::ids::RootId;
use pl_core::model::{ApprovalOutcome, ApprovalPolicy, Party, TaskStatus};
use rusqlite::{OptionalExtension, Transaction, params};

impl SqliteStore {
    pub fn create_task(
        &mut self,
        root: &RootId,
        request: TaskCreateRequest,
    ) -> Result<TaskRow, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;
        let row = insert_task_tx(&tx, root, request, now_ms)?;
        tx.commit()?;
        Ok(row)
    }

    /// Bulk creation used by provisioning: all tasks land, or none do.
    pub fn create_tasks_bulk(
        &mut self,
        root: &RootId,
        requests: Vec<TaskCreateRequest>,
    ) -> Result<Vec<TaskRow>, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;
        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            out.push(insert_task_tx(&tx, root, request, now_ms)?);
        }
        tx.commit()?;
        Ok(out)
    }

    pub fn get_task(&self, root: &RootId, id: &str) -> Result<Option<TaskRow>, StoreError> {
        let row = self
            .conn()
            .query_row(
                &format!("{TASK_SELECT} WHERE root = ?1 AND id = ?2"),
                params![root.as_str(), id],
                map_task_row,
            )
            .optional()?;
        row.map(finish_task_row).transpose()
    }

    pub fn list_tasks(
        &self,
        root: &RootId,
        request: TaskListRequest,
    ) -> Result<Vec<TaskRow>, StoreError> {
        let TaskListRequest {
            status,
            owning_party,
            workflow_id,
            limit,
            offset,
        } = request;

        let mut sql = format!("{TASK_SELECT} WHERE root = ?1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(root.as_str().to_string())];
        if let Some(status) = status {
            args.push(Box::new(status.as_str().to_string()));
            sql.push_str(&format!(" AND status = ?{}", args.len()));
        }
        if let Some(party) = owning_party {
            args.push(Box::new(party.as_str().to_string()));
            sql.push_str(&format!(" AND owning_party = ?{}", args.len()));
        }
        if let Some(workflow_id) = workflow_id {
            args.push(Box::new(workflow_id));
            sql.push_str(&format!(" AND workflow_id = ?{}", args.len()));
        }
        let limit = if limit == 0 { 200 } else { limit };
        args.push(Box::new(limit as i64));
        sql.push_str(&format!(" ORDER BY updated_at_ms DESC LIMIT ?{}", args.len()));
        args.push(Box::new(offset as i64));
        sql.push_str(&format!(" OFFSET ?{}", args.len()));

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), map_task_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(finish_task_row(row?)?);
        }
        Ok(out)
    }

    /// Apply a validated status change with the optimistic revision check.
    pub fn set_task_status(
        &mut self,
        root: &RootId,
        request: SetTaskStatusRequest,
    ) -> Result<(i64, EventRow), StoreError> {
        let SetTaskStatusRequest {
            id,
            expected_revision,
            status,
            subject_ids_json,
            event_type,
            event_payload_json,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;

        let revision: i64 = tx
            .query_row(
                "SELECT revision FROM tasks WHERE root = ?1 AND id = ?2",
                params![root.as_str(), &id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownId)?;
        check_revision(expected_revision, revision)?;

        let new_revision = revision + 1;
        tx.execute(
            r#"
            UPDATE tasks
            SET revision = ?3,
                status = ?4,
                subject_ids_json = COALESCE(?5, subject_ids_json),
                updated_at_ms = ?6
            WHERE root = ?1 AND id = ?2
            "#,
            params![
                root.as_str(),
                &id,
                new_revision,
                status.as_str(),
                subject_ids_json,
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

    /// Rewrite due dates in one transaction (the explicit recompute path).
    pub fn set_task_due_dates(
        &mut self,
        root: &RootId,
        updates: &[(String, i64)],
    ) -> Result<usize, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        let mut changed = 0usize;
        for (id, due_date_ms) in updates {
            changed += tx.execute(
                "UPDATE tasks SET due_date_ms = ?3, updated_at_ms = ?4 WHERE root = ?1 AND id = ?2",
                params![root.as_str(), id, due_date_ms, now_ms],
            )?;
        }
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            None,
            "task.deadlines_recomputed",
            &format!("{{\"updated\":{changed}}}"),
        )?;
        tx.commit()?;
        Ok(changed)
    }

    pub fn add_task_feedback(
        &mut self,
        root: &RootId,
        request: FeedbackAddRequest,
    ) -> Result<FeedbackRow, StoreError> {
        let FeedbackAddRequest {
            task_id,
            author,
            kind,
            content,
        } = request;
        if content.trim().is_empty() {
            return Err(StoreError::InvalidInput("feedback content must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_task_tx(&tx, root, &task_id)?;

        let seq = next_counter_tx(&tx, root.as_str(), "feedback_seq")?;
        let id = format!("FB-{seq:03}");
        tx.execute(
            r#"
            INSERT INTO task_feedback(root, id, task_id, author, kind, content, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![root.as_str(), id, task_id, author, kind, content, now_ms],
        )?;
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(&task_id),
            "task.feedback",
            "{}",
        )?;
        tx.commit()?;

        Ok(FeedbackRow {
            id,
            task_id,
            author,
            kind,
            content,
            created_at_ms: now_ms,
        })
    }

    pub fn list_task_feedback(
        &self,
        root: &RootId,
        task_id: &str,
    ) -> Result<Vec<FeedbackRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, task_id, author, kind, content, created_at_ms
            FROM task_feedback
            WHERE root = ?1 AND task_id = ?2
            ORDER BY created_at_ms ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), task_id], |row| {
            Ok(FeedbackRow {
                id: row.get(0)?,
                task_id: row.get(1)?,
                author: row.get(2)?,
                kind: row.get(3)?,
                content: row.get(4)?,
                created_at_ms: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_task_approvals(
        &self,
        root: &RootId,
        task_id: &str,
    ) -> Result<Vec<ApprovalRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT task_id, party, status, approver, created_at_ms, updated_at_ms
            FROM task_approvals
            WHERE root = ?1 AND task_id = ?2
            ORDER BY party ASC
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), task_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (task_id, party, status, approver, created, updated) = row?;
            out.push(ApprovalRow {
                task_id,
                party: parse_party(&party)?,
                status: parse_approval_outcome(&status)?,
                approver,
                created_at_ms: created,
                updated_at_ms: updated,
            });
        }
        Ok(out)
    }

    /// Upsert one party's sign-off and recompute the aggregate in the same
    /// transaction. When every required party shows `approved` and the task
    /// sits at `pending_final_approval`, the task completes; any `rejected`
    /// reverts it to `pending_review`. Feedback rows are untouched either
    /// way.
    pub fn record_approval(
        &mut self,
        root: &RootId,
        request: RecordApprovalRequest,
    ) -> Result<RecordApprovalResult, StoreError> {
        let RecordApprovalRequest {
            task_id,
            party,
            outcome,
            approver,
            required_parties,
            event_payload_json,
        } = request;
        if party == Party::Joint {
            return Err(StoreError::InvalidInput("approving party must be a side, not joint"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;

        let (revision, status): (i64, String) = tx
            .query_row(
                "SELECT revision, status FROM tasks WHERE root = ?1 AND id = ?2",
                params![root.as_str(), &task_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StoreError::UnknownId)?;
        let status = parse_task_status(&status)?;

        tx.execute(
            r#"
            INSERT INTO task_approvals(root, task_id, party, status, approver, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(root, task_id, party)
            DO UPDATE SET status=excluded.status, approver=excluded.approver, updated_at_ms=excluded.updated_at_ms
            "#,
            params![
                root.as_str(),
                &task_id,
                party.as_str(),
                outcome.as_str(),
                approver,
                now_ms
            ],
        )?;

        let mut approved = 0usize;
        let mut rejected = 0usize;
        {
            let mut stmt = tx.prepare(
                "SELECT party, status FROM task_approvals WHERE root = ?1 AND task_id = ?2",
            )?;
            let rows = stmt.query_map(params![root.as_str(), &task_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (row_party, row_status) = row?;
                let row_party = parse_party(&row_party)?;
                if !required_parties.contains(&row_party) {
                    continue;
                }
                match parse_approval_outcome(&row_status)? {
                    ApprovalOutcome::Approved => approved += 1,
                    ApprovalOutcome::Rejected => rejected += 1,
                    ApprovalOutcome::Pending => {}
                }
            }
        }

        let fully_approved = !required_parties.is_empty() && approved == required_parties.len();
        let any_rejected = rejected > 0;

        let new_status = if status == TaskStatus::PendingFinalApproval {
            if any_rejected {
                TaskStatus::PendingReview
            } else if fully_approved {
                TaskStatus::Completed
            } else {
                status
            }
        } else {
            status
        };

        let mut new_revision = revision;
        if new_status != status {
            new_revision = revision + 1;
            tx.execute(
                "UPDATE tasks SET revision = ?3, status = ?4, updated_at_ms = ?5 WHERE root = ?1 AND id = ?2",
                params![
                    root.as_str(),
                    &task_id,
                    new_revision,
                    new_status.as_str(),
                    now_ms
                ],
            )?;
            insert_event_tx(
                &tx,
                root.as_str(),
                now_ms,
                Some(&task_id),
                "task.status",
                &format!("{{\"to\":\"{}\"}}", new_status.as_str()),
            )?;
        }
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(&task_id),
            "task.approval",
            &event_payload_json,
        )?;
        tx.commit()?;

        Ok(RecordApprovalResult {
            fully_approved,
            reverted: any_rejected && new_status == TaskStatus::PendingReview
                && status == TaskStatus::PendingFinalApproval,
            task_status: new_status,
            task_revision: new_revision,
        })
    }

    /// Per-party open/review/approval counters for the collaboration view.
    pub fn collab_status(&self, root: &RootId) -> Result<CollabStatus, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT owning_party,
                   SUM(status <> 'completed'),
                   SUM(status = 'pending_review'),
                   SUM(status = 'pending_final_approval')
            FROM tasks
            WHERE root = ?1
            GROUP BY owning_party
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut out = CollabStatus::default();
        for row in rows {
            let (party, open, pending_review, pending_final_approval) = row?;
            let counters = PartyCounters {
                open,
                pending_review,
                pending_final_approval,
            };
            match parse_party(&party)? {
                Party::PartyA => out.party_a = counters,
                Party::PartyB => out.party_b = counters,
                Party::Joint => out.joint = counters,
            }
        }
        Ok(out)
    }
}

const TASK_SELECT: &str = r#"
SELECT id, revision, workflow_id, title, description, status, owning_party, approval_policy,
       category, due_date_ms, due_offset_days, subject_ids_json, created_at_ms, updated_at_ms
FROM tasks
"#;

type RawTaskRow = (
    String,
    i64,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<i64>,
    String,
    i64,
    i64,
);

fn map_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTaskRow> {
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
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    ))
}

fn finish_task_row(raw: RawTaskRow) -> Result<TaskRow, StoreError> {
    let (
        id,
        revision,
        workflow_id,
        title,
        description,
        status,
        owning_party,
        approval_policy,
        category,
        due_date_ms,
        due_offset_days,
        subject_ids_json,
        created_at_ms,
        updated_at_ms,
    ) = raw;
    Ok(TaskRow {
        id,
        revision,
        workflow_id,
        title,
        description,
        status: parse_task_status(&status)?,
        owning_party: parse_party(&owning_party)?,
        approval_policy: parse_policy(&approval_policy)?,
        category,
        due_date_ms,
        due_offset_days,
        subject_ids_json,
        created_at_ms,
        updated_at_ms,
    })
}

fn require_task_tx(tx: &Transaction<'_>, root: &RootId, task_id: &str) -> Result<(), StoreError> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM tasks WHERE root = ?1 AND id = ?2",
            params![root.as_str(), task_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists { Ok(()) } else { Err(StoreError::UnknownId) }
}

pub(crate) fn insert_task_tx(
    tx: &Transaction<'_>,
    root: &RootId,
    request: TaskCreateRequest,
    now_ms: i64,
) -> Result<TaskRow, StoreError> {
    let TaskCreateRequest {
        workflow_id,
        title,
        description,
        status,
        owning_party,
        approval_policy,
        category,
        due_date_ms,
        due_offset_days,
        subject_ids_json,
    } = request;
    if title.trim().is_empty() {
        return Err(StoreError::InvalidInput("task title must not be empty"));
    }
    if approval_policy == ApprovalPolicy::SingleParty && owning_party == Party::Joint {
        return Err(StoreError::InvalidInput(
            "joint-owned tasks cannot use a single-party approval policy",
        ));
    }

    let seq = next_counter_tx(tx, root.as_str(), "task_seq")?;
    let id = format!("TASK-{seq:03}");
    let subject_ids_json = subject_ids_json.unwrap_or_else(|| "[]".to_string());

    tx.execute(
        r#"
        INSERT INTO tasks(root, id, revision, workflow_id, title, description, status, owning_party,
                          approval_policy, category, due_date_ms, due_offset_days, subject_ids_json,
                          created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            root.as_str(),
            id,
            0i64,
            workflow_id,
            title,
            description,
            status.as_str(),
            owning_party.as_str(),
            approval_policy.as_str(),
            category,
            due_date_ms,
            due_offset_days,
            subject_ids_json,
            now_ms,
            now_ms
        ],
    )?;
    insert_event_tx(tx, root.as_str(), now_ms, Some(&id), "task.created", "{}")?;

    Ok(TaskRow {
        id,
        revision: 0,
        workflow_id,
        title,
        description,
        status,
        owning_party,
        approval_policy,
        category,
        due_date_ms,
        due_offset_days,
        subject_ids_json,
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    })
}
