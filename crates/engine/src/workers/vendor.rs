#![forbid(unsafe_code)]

use super::{arg_i64, arg_str};
use crate::router::{Table, WorkerCtx, WorkerName, WorkerOutcome, WorkerSpec, store_failure};
use pl_core::ladder;
use pl_core::model::TaskStatus;
use pl_storage::{BookAndAdvanceRequest, ShortlistAddRequest};
use serde_json::{Value, json};

pub(crate) fn register(specs: &mut Vec<WorkerSpec>) {
    specs.push(WorkerSpec {
        name: WorkerName::Vendor,
        description: "Searches the vendor catalog, keeps the shortlist, and confirms bookings.",
        args_schema: json!({
            "type": "object",
            "properties": {
                "op": { "enum": ["search", "shortlist", "book", "list"] },
                "category": { "type": "string" },
                "query": { "type": "string" },
                "vendor_name": { "type": "string" },
                "estimated_cost_cents": { "type": "integer" },
                "notes": { "type": "string" },
                "shortlist_id": { "type": "string" },
                "event_date_ms": { "type": "integer" },
                "total_amount_cents": { "type": "integer" },
                "task_id": { "type": "string" }
            },
            "required": ["op"]
        }),
        required_args: &["op"],
        owned_tables: &[Table::Shortlist, Table::Bookings],
        handler: handle,
    });
}

fn handle(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(op) = arg_str(args, "op") else {
        return WorkerOutcome::validation("op is required");
    };
    match op {
        "search" => search(ctx, args),
        "shortlist" => shortlist(ctx, args),
        "book" => book(ctx, args),
        "list" => list(ctx),
        other => WorkerOutcome::validation(format!("unknown vendor op: {other}")),
    }
}

fn search(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let category = arg_str(args, "category").unwrap_or("venue");
    let query = arg_str(args, "query").unwrap_or_default();

    // Bookings first: no point searching a category that is already covered.
    let booked = match ctx.store.bookings_list(ctx.root, 50) {
        Ok(rows) => rows,
        Err(err) => return store_failure(err),
    };

    let found = ctx.catalog.search(category, query, 5);
    if found.is_empty() {
        return WorkerOutcome::domain(format!("No matching {category} options were found."));
    }
    let vendors: Vec<Value> = found
        .iter()
        .map(|v| {
            json!({
                "name": v.name,
                "category": v.category,
                "city": v.city,
                "rating": v.rating,
                "price_cents": v.price_cents,
            })
        })
        .collect();
    WorkerOutcome::success(
        format!("Found {} {category} option(s).", vendors.len()),
        json!({ "vendors": vendors, "existing_bookings": booked.len() }),
    )
}

fn shortlist(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(vendor_name) = arg_str(args, "vendor_name") else {
        return WorkerOutcome::validation("vendor_name is required to shortlist");
    };
    let category = arg_str(args, "category").unwrap_or("venue");
    let request = ShortlistAddRequest {
        vendor_name: vendor_name.to_string(),
        category: category.to_string(),
        estimated_cost_cents: arg_i64(args, "estimated_cost_cents"),
        notes: arg_str(args, "notes").map(str::to_string),
    };
    match ctx.store.shortlist_add(ctx.root, request) {
        Ok(row) => WorkerOutcome::success(
            format!("Shortlisted {} under {}.", row.vendor_name, row.category),
            json!({ "shortlist_id": row.id }),
        ),
        Err(err) => store_failure(err),
    }
}

fn book(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(shortlist_id) = arg_str(args, "shortlist_id") else {
        return WorkerOutcome::validation("shortlist_id is required to book");
    };
    let Some(event_date_ms) = arg_i64(args, "event_date_ms") else {
        return WorkerOutcome::validation("event_date_ms is required to book");
    };
    let Some(task_id) = arg_str(args, "task_id") else {
        return WorkerOutcome::validation("task_id is required to book");
    };

    let task = match ctx.store.get_task(ctx.root, task_id) {
        Ok(Some(task)) => task,
        Ok(None) => return WorkerOutcome::validation("booking task was not found"),
        Err(err) => return store_failure(err),
    };
    // The booking may only close the task when its policy allows a direct
    // completion; reviewed tasks go through the approval ladder instead.
    if let Err(err) = ladder::task_transition(task.status, TaskStatus::Completed, task.approval_policy)
    {
        return WorkerOutcome::validation(format!(
            "the linked task cannot be closed by booking directly ({err})"
        ));
    }

    let request = BookAndAdvanceRequest {
        shortlist_id: shortlist_id.to_string(),
        event_date_ms,
        total_amount_cents: arg_i64(args, "total_amount_cents"),
        task_id: task.id.clone(),
        expected_task_revision: Some(task.revision),
        task_status: TaskStatus::Completed,
        event_payload_json: json!({ "shortlist_id": shortlist_id }).to_string(),
    };
    match ctx.store.book_and_advance_task(ctx.root, request) {
        Ok((booking, _revision)) => WorkerOutcome::success(
            format!("Booked {} and closed {}.", booking.vendor_name, task.id),
            json!({ "booking_id": booking.id, "task_id": task.id }),
        ),
        Err(err) => store_failure(err),
    }
}

fn list(ctx: &mut WorkerCtx<'_>) -> WorkerOutcome {
    let shortlist = match ctx.store.shortlist_list(ctx.root, 20) {
        Ok(rows) => rows,
        Err(err) => return store_failure(err),
    };
    let bookings = match ctx.store.bookings_list(ctx.root, 20) {
        Ok(rows) => rows,
        Err(err) => return store_failure(err),
    };
    let shortlist_json: Vec<Value> = shortlist
        .iter()
        .map(|r| json!({ "id": r.id, "vendor": r.vendor_name, "category": r.category, "status": r.status }))
        .collect();
    let bookings_json: Vec<Value> = bookings
        .iter()
        .map(|r| json!({ "id": r.id, "vendor": r.vendor_name, "status": r.status }))
        .collect();
    WorkerOutcome::success(
        format!(
            "{} shortlisted, {} booked.",
            shortlist_json.len(),
            bookings_json.len()
        ),
        json!({ "shortlist": shortlist_json, "bookings": bookings_json }),
    )
}
