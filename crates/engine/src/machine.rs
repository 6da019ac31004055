#![forbid(unsafe_code)]

//! The sole authority for Workflow/Task status transitions. Pure transition
//! rules live in `pl_core::ladder`; this module reads current state, checks
//! the rule, and applies the change through the store's revision-guarded
//! writes. A racing writer surfaces as a concurrency failure, which is
//! retried exactly once against a fresh read.

use crate::capabilities::NotificationSender;
use crate::error::{EngineError, ValidationKind};
use pl_core::ids::RootId;
use pl_core::ladder;
use pl_core::model::{ApprovalOutcome, ApprovalPolicy, Party, TaskStatus, WorkflowStatus};
use pl_storage::{
    CreateWorkflowRequest, RecordApprovalRequest, RecordApprovalResult, SetTaskStatusRequest,
    SetWorkflowStateRequest, SqliteStore, TaskRow, WorkflowRow,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const DAY_MS: i64 = 86_400_000;

/// The workflow "save file": everything needed to re-prime reasoning after
/// an arbitrary pause, without replaying any turn history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub stage_goal: Option<String>,
    #[serde(default)]
    pub summary_text: Option<String>,
    #[serde(default)]
    pub next_possible_actions: Vec<String>,
    #[serde(default)]
    pub contextual_data: Value,
}

pub struct StateMachine<'a> {
    store: &'a mut SqliteStore,
    notifier: &'a dyn NotificationSender,
}

impl<'a> StateMachine<'a> {
    pub fn new(store: &'a mut SqliteStore, notifier: &'a dyn NotificationSender) -> Self {
        Self { store, notifier }
    }

    /// Create a workflow in `not_started`. It advances to `in_progress` when
    /// its first associated action is noted.
    pub fn start_workflow(
        &mut self,
        root: &RootId,
        name: &str,
    ) -> Result<WorkflowRow, EngineError> {
        let row = self
            .store
            .create_workflow(
                root,
                CreateWorkflowRequest {
                    name: name.to_string(),
                    context_summary_json: None,
                    related_ids_json: None,
                    event_payload_json: json!({ "name": name }).to_string(),
                },
            )
            .map_err(|err| EngineError::from_store(err, "the workflow"))?;
        self.notify(root, "workflow.started", json!({ "workflow_id": &row.id, "name": name }));
        Ok(row)
    }

    /// First associated action on a fresh workflow moves it to
    /// `in_progress`; anything later is a no-op.
    pub fn note_workflow_action(
        &mut self,
        root: &RootId,
        workflow_id: &str,
    ) -> Result<WorkflowRow, EngineError> {
        retry_once(|| {
            let wf = self.get_workflow(root, workflow_id)?;
            if wf.status != WorkflowStatus::NotStarted {
                return Ok(wf);
            }
            ladder::workflow_transition(wf.status, WorkflowStatus::InProgress)?;
            self.set_workflow(
                root,
                &wf,
                WorkflowStatus::InProgress,
                None,
                None,
                None,
                "workflow.status",
            )?;
            self.get_workflow(root, workflow_id)
        })
    }

    /// Persist a fresh save file (overwrite, never append) and park the
    /// workflow. `awaiting_feedback` when a specific response is expected
    /// back, `paused` otherwise. Only legal from an in-flight state.
    pub fn pause_workflow(
        &mut self,
        root: &RootId,
        workflow_id: &str,
        summary: &ContextSummary,
        related_ids: &[String],
        awaiting_feedback: bool,
    ) -> Result<WorkflowRow, EngineError> {
        let target = if awaiting_feedback {
            WorkflowStatus::AwaitingFeedback
        } else {
            WorkflowStatus::Paused
        };
        let summary_json = serde_json::to_string(summary)
            .map_err(|err| EngineError::Transient { message: format!("summary encode: {err}") })?;
        let related_json = serde_json::to_string(related_ids)
            .map_err(|err| EngineError::Transient { message: format!("related encode: {err}") })?;

        retry_once(|| {
            let wf = self.get_workflow(root, workflow_id)?;
            if !matches!(
                wf.status,
                WorkflowStatus::InProgress | WorkflowStatus::AwaitingFeedback
            ) {
                return Err(ladder::TransitionError::InvalidWorkflowTransition {
                    from: wf.status,
                    to: target,
                }
                .into());
            }
            self.set_workflow(
                root,
                &wf,
                target,
                Some(summary_json.clone()),
                Some(related_json.clone()),
                None,
                "workflow.paused",
            )?;
            self.get_workflow(root, workflow_id)
        })
    }

    /// Return the stored save file and move the workflow back to
    /// `in_progress`. Calling on an already-running workflow just returns
    /// the current summary.
    pub fn resume_workflow(
        &mut self,
        root: &RootId,
        workflow_id: &str,
    ) -> Result<ContextSummary, EngineError> {
        retry_once(|| {
            let wf = self.get_workflow(root, workflow_id)?;
            let summary = parse_summary(wf.context_summary_json.as_deref());
            if wf.status == WorkflowStatus::InProgress {
                return Ok(summary);
            }
            ladder::workflow_transition(wf.status, WorkflowStatus::InProgress)?;
            self.set_workflow(
                root,
                &wf,
                WorkflowStatus::InProgress,
                None,
                None,
                None,
                "workflow.resumed",
            )?;
            Ok(summary)
        })
    }

    /// Terminal; idempotent when repeated with the same outcome.
    pub fn complete_workflow(&mut self, root: &RootId, workflow_id: &str) -> Result<(), EngineError> {
        self.finish_workflow(root, workflow_id, WorkflowStatus::Completed, None)
    }

    pub fn fail_workflow(
        &mut self,
        root: &RootId,
        workflow_id: &str,
        reason: &str,
    ) -> Result<(), EngineError> {
        self.finish_workflow(
            root,
            workflow_id,
            WorkflowStatus::Failed,
            Some(reason.to_string()),
        )
    }

    fn finish_workflow(
        &mut self,
        root: &RootId,
        workflow_id: &str,
        outcome: WorkflowStatus,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        retry_once(|| {
            let wf = self.get_workflow(root, workflow_id)?;
            if wf.status == outcome {
                return Ok(());
            }
            ladder::workflow_transition(wf.status, outcome)?;
            self.set_workflow(root, &wf, outcome, None, None, reason.clone(), "workflow.finished")?;
            Ok(())
        })?;
        self.notify(
            root,
            "workflow.finished",
            json!({ "workflow_id": workflow_id, "outcome": outcome.as_str() }),
        );
        Ok(())
    }

    /// Move a task along the review ladder. Rejected by the pure rules when
    /// the jump skips a required step; a lost race is retried once against
    /// the updated row and then re-validated, so a double-advance can never
    /// slip through.
    pub fn advance_task(
        &mut self,
        root: &RootId,
        task_id: &str,
        new_status: TaskStatus,
    ) -> Result<TaskRow, EngineError> {
        let row = retry_once(|| {
            let task = self.get_task(root, task_id)?;
            ladder::task_transition(task.status, new_status, task.approval_policy)?;
            self.store
                .set_task_status(
                    root,
                    SetTaskStatusRequest {
                        id: task.id.clone(),
                        expected_revision: Some(task.revision),
                        status: new_status,
                        subject_ids_json: None,
                        event_type: "task.status".to_string(),
                        event_payload_json: json!({ "to": new_status.as_str() }).to_string(),
                    },
                )
                .map_err(|err| EngineError::from_store(err, "the task"))?;
            self.get_task(root, task_id)
        })?;
        self.notify(
            root,
            "task.status",
            json!({ "task_id": task_id, "status": new_status.as_str() }),
        );
        Ok(row)
    }

    /// The explicit consensus action: one side proposes a final choice,
    /// moving the task from shared review to final approval. Feedback alone
    /// never does this.
    pub fn propose_final_choice(
        &mut self,
        root: &RootId,
        task_id: &str,
        subject_ids: &[String],
    ) -> Result<TaskRow, EngineError> {
        let subjects_json = serde_json::to_string(subject_ids)
            .map_err(|err| EngineError::Transient { message: format!("subjects encode: {err}") })?;
        let row = retry_once(|| {
            let task = self.get_task(root, task_id)?;
            ladder::task_transition(
                task.status,
                TaskStatus::PendingFinalApproval,
                task.approval_policy,
            )?;
            self.store
                .set_task_status(
                    root,
                    SetTaskStatusRequest {
                        id: task.id.clone(),
                        expected_revision: Some(task.revision),
                        status: TaskStatus::PendingFinalApproval,
                        subject_ids_json: Some(subjects_json.clone()),
                        event_type: "task.final_proposed".to_string(),
                        event_payload_json: json!({ "subjects": subject_ids }).to_string(),
                    },
                )
                .map_err(|err| EngineError::from_store(err, "the task"))?;
            self.get_task(root, task_id)
        })?;
        self.notify(
            root,
            "task.final_proposed",
            json!({ "task_id": task_id, "subjects": subject_ids }),
        );
        Ok(row)
    }

    /// Record one party's sign-off and recompute the aggregate. Returns the
    /// store's aggregate result; `fully_approved` is the signal to stop
    /// polling. Completion and reversion happen inside the same transaction
    /// as the upsert.
    pub fn record_approval(
        &mut self,
        root: &RootId,
        task_id: &str,
        party: Party,
        outcome: ApprovalOutcome,
        approver: Option<&str>,
    ) -> Result<RecordApprovalResult, EngineError> {
        let task = self.get_task(root, task_id)?;
        if task.approval_policy == ApprovalPolicy::NoApproval {
            return Err(EngineError::Validation(ValidationKind::InvalidInput(
                "this task does not take approvals",
            )));
        }
        let required = task.approval_policy.required_parties(task.owning_party);
        if !required.contains(&party) {
            return Err(EngineError::Validation(ValidationKind::InvalidInput(
                "this side's approval is not required for the task",
            )));
        }

        let result = self
            .store
            .record_approval(
                root,
                RecordApprovalRequest {
                    task_id: task.id.clone(),
                    party,
                    outcome,
                    approver: approver.map(str::to_string),
                    required_parties: required,
                    event_payload_json: json!({
                        "party": party.as_str(),
                        "outcome": outcome.as_str(),
                    })
                    .to_string(),
                },
            )
            .map_err(|err| EngineError::from_store(err, "the approval"))?;

        self.notify(
            root,
            "task.approval",
            json!({
                "task_id": task_id,
                "party": party.as_str(),
                "outcome": outcome.as_str(),
                "fully_approved": result.fully_approved,
            }),
        );
        Ok(result)
    }

    /// Deadlines are frozen at task creation. A later target-date change
    /// takes effect only through this explicit recompute, which refuses to
    /// run without a target date rather than drifting silently.
    pub fn recompute_deadlines(&mut self, root: &RootId) -> Result<usize, EngineError> {
        let root_row = self
            .store
            .get_root(root)
            .map_err(|err| EngineError::from_store(err, "the plan"))?
            .ok_or_else(|| {
                EngineError::Validation(ValidationKind::UnknownEntity {
                    entity: "the plan".to_string(),
                })
            })?;
        let Some(target) = root_row.target_date_ms else {
            return Err(EngineError::Validation(ValidationKind::MissingTargetDate));
        };

        let tasks = self
            .store
            .list_tasks(
                root,
                pl_storage::TaskListRequest {
                    limit: 500,
                    ..pl_storage::TaskListRequest::default()
                },
            )
            .map_err(|err| EngineError::from_store(err, "tasks"))?;
        let updates: Vec<(String, i64)> = tasks
            .iter()
            .filter_map(|t| {
                t.due_offset_days
                    .map(|offset| (t.id.clone(), target - offset * DAY_MS))
            })
            .collect();
        self.store
            .set_task_due_dates(root, &updates)
            .map_err(|err| EngineError::from_store(err, "tasks"))
    }

    fn get_workflow(&self, root: &RootId, id: &str) -> Result<WorkflowRow, EngineError> {
        self.store
            .get_workflow(root, id)
            .map_err(|err| EngineError::from_store(err, "the workflow"))?
            .ok_or_else(|| {
                EngineError::Validation(ValidationKind::UnknownEntity {
                    entity: format!("workflow {id}"),
                })
            })
    }

    fn get_task(&self, root: &RootId, id: &str) -> Result<TaskRow, EngineError> {
        self.store
            .get_task(root, id)
            .map_err(|err| EngineError::from_store(err, "the task"))?
            .ok_or_else(|| {
                EngineError::Validation(ValidationKind::UnknownEntity {
                    entity: format!("task {id}"),
                })
            })
    }

    fn set_workflow(
        &mut self,
        root: &RootId,
        wf: &WorkflowRow,
        status: WorkflowStatus,
        context_summary_json: Option<String>,
        related_ids_json: Option<String>,
        failure_reason: Option<String>,
        event_type: &str,
    ) -> Result<(), EngineError> {
        self.store
            .set_workflow_state(
                root,
                SetWorkflowStateRequest {
                    id: wf.id.clone(),
                    expected_revision: Some(wf.revision),
                    status,
                    context_summary_json,
                    related_ids_json,
                    failure_reason,
                    event_type: event_type.to_string(),
                    event_payload_json: json!({ "to": status.as_str() }).to_string(),
                },
            )
            .map_err(|err| EngineError::from_store(err, "the workflow"))?;
        Ok(())
    }

    /// Fire-and-forget: a failed or missing channel never blocks a
    /// transition.
    fn notify(&mut self, root: &RootId, template_id: &str, payload: Value) {
        let recipients = match self.store.list_members(root) {
            Ok(members) => members.into_iter().map(|m| m.identity).collect::<Vec<_>>(),
            Err(_) => return,
        };
        let _ = self.notifier.notify(&recipients, template_id, &payload);
    }
}

fn parse_summary(raw: Option<&str>) -> ContextSummary {
    raw.and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

/// One automatic retry for lost races, then the error stands.
fn retry_once<T>(mut op: impl FnMut() -> Result<T, EngineError>) -> Result<T, EngineError> {
    match op() {
        Err(err) if err.is_concurrency() => op(),
        other => other,
    }
}
