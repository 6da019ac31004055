#![forbid(unsafe_code)]

use super::arg_str;
use crate::router::{Table, WorkerCtx, WorkerName, WorkerOutcome, WorkerSpec, store_failure};
use pl_core::model::Party;
use pl_storage::GuestAddRequest;
use serde_json::{Value, json};

const RSVP_STATUSES: &[&str] = &["invited", "accepted", "declined", "tentative"];

pub(crate) fn register(specs: &mut Vec<WorkerSpec>) {
    specs.push(WorkerSpec {
        name: WorkerName::Guest,
        description: "Maintains the guest list and RSVP state per side.",
        args_schema: json!({
            "type": "object",
            "properties": {
                "op": { "enum": ["add", "rsvp", "list"] },
                "name": { "type": "string" },
                "contact": { "type": "string" },
                "side": { "enum": ["party_a", "party_b", "joint"] },
                "dietary": { "type": "string" },
                "guest_id": { "type": "string" },
                "status": { "enum": RSVP_STATUSES }
            },
            "required": ["op"]
        }),
        required_args: &["op"],
        owned_tables: &[Table::Guests],
        handler: handle,
    });
}

fn handle(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(op) = arg_str(args, "op") else {
        return WorkerOutcome::validation("op is required");
    };
    match op {
        "add" => add(ctx, args),
        "rsvp" => rsvp(ctx, args),
        "list" => list(ctx),
        other => WorkerOutcome::validation(format!("unknown guest op: {other}")),
    }
}

fn add(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(name) = arg_str(args, "name") else {
        return WorkerOutcome::validation("name is required");
    };
    let side = match arg_str(args, "side") {
        None => None,
        Some(raw) => match Party::parse(raw) {
            Some(party) => Some(party),
            None => return WorkerOutcome::validation("side must be a known party"),
        },
    };
    let request = GuestAddRequest {
        name: name.to_string(),
        contact: arg_str(args, "contact").map(str::to_string),
        side,
        dietary: arg_str(args, "dietary").map(str::to_string),
    };
    match ctx.store.guest_add(ctx.root, request) {
        Ok(row) => WorkerOutcome::success(
            format!("Added {} to the guest list.", row.name),
            json!({ "guest_id": row.id }),
        ),
        Err(err) => store_failure(err),
    }
}

fn rsvp(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(guest_id) = arg_str(args, "guest_id") else {
        return WorkerOutcome::validation("guest_id is required");
    };
    let Some(status) = arg_str(args, "status") else {
        return WorkerOutcome::validation("status is required");
    };
    if !RSVP_STATUSES.contains(&status) {
        return WorkerOutcome::validation("status must be one of invited/accepted/declined/tentative");
    }
    match ctx.store.guest_set_status(ctx.root, guest_id, status) {
        Ok(()) => WorkerOutcome::success(
            format!("Marked {guest_id} as {status}."),
            json!({ "guest_id": guest_id, "status": status }),
        ),
        Err(err) => store_failure(err),
    }
}

fn list(ctx: &mut WorkerCtx<'_>) -> WorkerOutcome {
    match ctx.store.guest_list(ctx.root, 100) {
        Ok(rows) => {
            if rows.is_empty() {
                return WorkerOutcome::domain("The guest list is empty so far.");
            }
            let accepted = rows.iter().filter(|r| r.status == "accepted").count();
            let guests: Vec<Value> = rows
                .iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "name": r.name,
                        "side": r.side.map(|p| p.as_str()),
                        "status": r.status,
                    })
                })
                .collect();
            WorkerOutcome::success(
                format!("{} guest(s), {accepted} accepted.", guests.len()),
                json!({ "guests": guests }),
            )
        }
        Err(err) => store_failure(err),
    }
}
