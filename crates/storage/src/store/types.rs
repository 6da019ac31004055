#![forbid(unsafe_code)]

use pl_core::model::{
    ApprovalOutcome, ApprovalPolicy, Party, Role, RootStatus, TaskStatus, WorkflowStatus,
};

#[derive(Clone, Debug)]
pub struct RootRow {
    pub id: String,
    pub revision: i64,
    pub display_name: String,
    pub target_date_ms: Option<i64>,
    pub status: RootStatus,
    pub details_json: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct MemberRow {
    pub identity: String,
    pub role: Role,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct WorkflowRow {
    pub id: String,
    pub revision: i64,
    pub name: String,
    pub status: WorkflowStatus,
    pub context_summary_json: Option<String>,
    pub related_ids_json: String,
    pub failure_reason: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct TaskRow {
    pub id: String,
    pub revision: i64,
    pub workflow_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub owning_party: Party,
    pub approval_policy: ApprovalPolicy,
    pub category: Option<String>,
    pub due_date_ms: Option<i64>,
    pub due_offset_days: Option<i64>,
    pub subject_ids_json: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct FeedbackRow {
    pub id: String,
    pub task_id: String,
    pub author: String,
    pub kind: String,
    pub content: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ApprovalRow {
    pub task_id: String,
    pub party: Party,
    pub status: ApprovalOutcome,
    pub approver: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct TurnRow {
    pub seq: i64,
    pub speaker: String,
    pub content: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ConversationStateRow {
    pub rolling_summary: String,
    pub turn_count: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct FactRow {
    pub id: String,
    pub content: String,
    pub embedding_json: String,
    pub metadata_json: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct EventRow {
    pub seq: i64,
    pub ts_ms: i64,
    pub entity_id: Option<String>,
    pub event_type: String,
    pub payload_json: String,
}

impl EventRow {
    pub fn event_id(&self) -> String {
        format!("evt_{:016}", self.seq)
    }
}

#[derive(Clone, Debug)]
pub struct ShortlistRow {
    pub id: String,
    pub vendor_name: String,
    pub category: String,
    pub status: String,
    pub estimated_cost_cents: Option<i64>,
    pub notes: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct BookingRow {
    pub id: String,
    pub shortlist_id: Option<String>,
    pub vendor_name: String,
    pub event_date_ms: i64,
    pub status: String,
    pub total_amount_cents: Option<i64>,
    pub paid_amount_cents: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct BudgetItemRow {
    pub id: String,
    pub item_name: String,
    pub category: String,
    pub amount_cents: i64,
    pub vendor_name: Option<String>,
    pub status: String,
    pub contribution_by: Party,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct GuestRow {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub side: Option<Party>,
    pub status: String,
    pub dietary: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct TimelineEventRow {
    pub id: String,
    pub name: String,
    pub at_ms: i64,
    pub location: Option<String>,
    pub description: Option<String>,
    pub relevant_party: Option<Party>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct BoardItemRow {
    pub id: String,
    pub note: Option<String>,
    pub category: String,
    pub image_ref: Option<String>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct RitualNoteRow {
    pub id: String,
    pub tradition: String,
    pub topic: String,
    pub content: String,
    pub created_at_ms: i64,
}

/// Per-party task counters for the collaboration view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartyCounters {
    pub open: i64,
    pub pending_review: i64,
    pub pending_final_approval: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollabStatus {
    pub party_a: PartyCounters,
    pub party_b: PartyCounters,
    pub joint: PartyCounters,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BudgetSummary {
    pub item_count: i64,
    pub total_cents: i64,
}
