#![forbid(unsafe_code)]

use super::{arg_i64, arg_str};
use crate::router::{Table, WorkerCtx, WorkerName, WorkerOutcome, WorkerSpec, store_failure};
use pl_core::model::{ApprovalPolicy, Party, TaskStatus};
use pl_storage::{TaskCreateRequest, TaskListRequest, TimelineAddRequest};
use serde_json::{Value, json};

pub(crate) fn register(specs: &mut Vec<WorkerSpec>) {
    specs.push(WorkerSpec {
        name: WorkerName::Timeline,
        description: "Creates ad hoc tasks, keeps the event timeline, and reports what is due.",
        args_schema: json!({
            "type": "object",
            "properties": {
                "op": { "enum": ["task.add", "event.add", "list"] },
                "title": { "type": "string" },
                "description": { "type": "string" },
                "owner": { "enum": ["party_a", "party_b", "joint"] },
                "due_date_ms": { "type": "integer" },
                "name": { "type": "string" },
                "at_ms": { "type": "integer" },
                "location": { "type": "string" }
            },
            "required": ["op"]
        }),
        required_args: &["op"],
        owned_tables: &[Table::Tasks, Table::TimelineEvents],
        handler: handle,
    });
}

fn handle(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(op) = arg_str(args, "op") else {
        return WorkerOutcome::validation("op is required");
    };
    match op {
        "task.add" => task_add(ctx, args),
        "event.add" => event_add(ctx, args),
        "list" => list(ctx),
        other => WorkerOutcome::validation(format!("unknown timeline op: {other}")),
    }
}

fn task_add(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(title) = arg_str(args, "title") else {
        return WorkerOutcome::validation("title is required");
    };
    let owner = match arg_str(args, "owner") {
        None => Party::Joint,
        Some(raw) => match Party::parse(raw) {
            Some(party) => party,
            None => return WorkerOutcome::validation("owner must be a known party"),
        },
    };
    // Joint ad hoc items need both sides to sign off; single-owner ones skip
    // the review ladder entirely.
    let approval_policy = if owner == Party::Joint {
        ApprovalPolicy::DualParty
    } else {
        ApprovalPolicy::NoApproval
    };
    let request = TaskCreateRequest {
        workflow_id: None,
        title: title.to_string(),
        description: arg_str(args, "description").map(str::to_string),
        status: TaskStatus::NotStarted,
        owning_party: owner,
        approval_policy,
        category: Some("timeline".to_string()),
        due_date_ms: arg_i64(args, "due_date_ms"),
        due_offset_days: None,
        subject_ids_json: None,
    };
    match ctx.store.create_task(ctx.root, request) {
        Ok(row) => WorkerOutcome::success(
            format!("Created task {} ({}).", row.id, row.title),
            json!({ "task_id": row.id }),
        ),
        Err(err) => store_failure(err),
    }
}

fn event_add(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(name) = arg_str(args, "name") else {
        return WorkerOutcome::validation("name is required");
    };
    let Some(at_ms) = arg_i64(args, "at_ms") else {
        return WorkerOutcome::validation("at_ms is required");
    };
    let request = TimelineAddRequest {
        name: name.to_string(),
        at_ms,
        location: arg_str(args, "location").map(str::to_string),
        description: arg_str(args, "description").map(str::to_string),
        relevant_party: None,
    };
    match ctx.store.timeline_add_event(ctx.root, request) {
        Ok(row) => WorkerOutcome::success(
            format!("Added {} to the timeline.", row.name),
            json!({ "event_id": row.id }),
        ),
        Err(err) => store_failure(err),
    }
}

fn list(ctx: &mut WorkerCtx<'_>) -> WorkerOutcome {
    let tasks = match ctx.store.list_tasks(
        ctx.root,
        TaskListRequest {
            limit: 50,
            ..TaskListRequest::default()
        },
    ) {
        Ok(rows) => rows,
        Err(err) => return store_failure(err),
    };
    let events = match ctx.store.timeline_list(ctx.root, 50) {
        Ok(rows) => rows,
        Err(err) => return store_failure(err),
    };

    let open: Vec<Value> = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Completed)
        .map(|t| {
            json!({
                "id": t.id,
                "title": t.title,
                "status": t.status.as_str(),
                "owner": t.owning_party.as_str(),
                "due_date_ms": t.due_date_ms,
            })
        })
        .collect();
    let events_json: Vec<Value> = events
        .iter()
        .map(|e| json!({ "id": e.id, "name": e.name, "at_ms": e.at_ms }))
        .collect();
    if open.is_empty() && events_json.is_empty() {
        return WorkerOutcome::domain("Nothing is scheduled or pending right now.");
    }
    WorkerOutcome::success(
        format!(
            "{} open task(s), {} timeline event(s).",
            open.len(),
            events_json.len()
        ),
        json!({ "open_tasks": open, "events": events_json }),
    )
}
