#![forbid(unsafe_code)]

use pl_core::model::{ApprovalOutcome, ApprovalPolicy, Party, TaskStatus, WorkflowStatus};

#[derive(Clone, Debug)]
pub struct CreateRootRequest {
    pub display_name: String,
    pub target_date_ms: Option<i64>,
    pub details_json: String,
}

#[derive(Clone, Debug)]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub context_summary_json: Option<String>,
    pub related_ids_json: Option<String>,
    pub event_payload_json: String,
}

#[derive(Clone, Debug)]
pub struct SetWorkflowStateRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub status: WorkflowStatus,
    /// `Some` overwrites the stored summary (pause writes a fresh snapshot,
    /// never appends); `None` leaves it untouched.
    pub context_summary_json: Option<String>,
    pub related_ids_json: Option<String>,
    pub failure_reason: Option<String>,
    pub event_type: String,
    pub event_payload_json: String,
}

#[derive(Clone, Debug)]
pub struct TaskCreateRequest {
    pub workflow_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub owning_party: Party,
    pub approval_policy: ApprovalPolicy,
    pub category: Option<String>,
    pub due_date_ms: Option<i64>,
    pub due_offset_days: Option<i64>,
    pub subject_ids_json: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SetTaskStatusRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub status: TaskStatus,
    pub subject_ids_json: Option<String>,
    pub event_type: String,
    pub event_payload_json: String,
}

#[derive(Clone, Debug, Default)]
pub struct TaskListRequest {
    pub status: Option<TaskStatus>,
    pub owning_party: Option<Party>,
    pub workflow_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct FeedbackAddRequest {
    pub task_id: String,
    pub author: String,
    pub kind: String,
    pub content: String,
}

#[derive(Clone, Debug)]
pub struct RecordApprovalRequest {
    pub task_id: String,
    pub party: Party,
    pub outcome: ApprovalOutcome,
    pub approver: Option<String>,
    /// Parties whose sign-off the task requires, derived from its policy by
    /// the caller. The aggregate is recomputed against this set inside the
    /// same transaction as the upsert.
    pub required_parties: Vec<Party>,
    pub event_payload_json: String,
}

#[derive(Clone, Debug)]
pub struct RecordApprovalResult {
    pub fully_approved: bool,
    pub reverted: bool,
    pub task_status: TaskStatus,
    pub task_revision: i64,
}

#[derive(Clone, Debug)]
pub struct CompactTurnsRequest {
    pub keep_last: usize,
    pub rolling_summary: String,
}

#[derive(Clone, Debug)]
pub struct ShortlistAddRequest {
    pub vendor_name: String,
    pub category: String,
    pub estimated_cost_cents: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BookingCreateRequest {
    pub shortlist_id: Option<String>,
    pub vendor_name: String,
    pub event_date_ms: i64,
    pub total_amount_cents: Option<i64>,
}

/// The atomic worker-write + task-transition unit: confirm a booking from a
/// shortlisted option and advance the linked task in one transaction, or do
/// neither.
#[derive(Clone, Debug)]
pub struct BookAndAdvanceRequest {
    pub shortlist_id: String,
    pub event_date_ms: i64,
    pub total_amount_cents: Option<i64>,
    pub task_id: String,
    pub expected_task_revision: Option<i64>,
    pub task_status: TaskStatus,
    pub event_payload_json: String,
}

#[derive(Clone, Debug)]
pub struct BudgetUpsertRequest {
    pub item_name: String,
    pub category: String,
    pub amount_cents: i64,
    pub vendor_name: Option<String>,
    pub status: String,
    pub contribution_by: Party,
}

#[derive(Clone, Debug)]
pub struct GuestAddRequest {
    pub name: String,
    pub contact: Option<String>,
    pub side: Option<Party>,
    pub dietary: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TimelineAddRequest {
    pub name: String,
    pub at_ms: i64,
    pub location: Option<String>,
    pub description: Option<String>,
    pub relevant_party: Option<Party>,
}

#[derive(Clone, Debug)]
pub struct BoardAddRequest {
    pub note: Option<String>,
    pub category: String,
    pub image_ref: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RitualNoteAddRequest {
    pub tradition: String,
    pub topic: String,
    pub content: String,
}

#[derive(Clone, Debug)]
pub struct FactAddRequest {
    pub content: String,
    pub embedding_json: String,
    pub metadata_json: String,
}
