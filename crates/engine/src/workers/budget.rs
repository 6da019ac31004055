#![forbid(unsafe_code)]

use super::{arg_i64, arg_str};
use crate::router::{Table, WorkerCtx, WorkerName, WorkerOutcome, WorkerSpec, store_failure};
use pl_core::model::Party;
use pl_storage::BudgetUpsertRequest;
use serde_json::{Value, json};

pub(crate) fn register(specs: &mut Vec<WorkerSpec>) {
    specs.push(WorkerSpec {
        name: WorkerName::Budget,
        description: "Tracks budget line items and totals per contributing side.",
        args_schema: json!({
            "type": "object",
            "properties": {
                "op": { "enum": ["set", "summary", "list"] },
                "item_name": { "type": "string" },
                "category": { "type": "string" },
                "amount_cents": { "type": "integer" },
                "vendor_name": { "type": "string" },
                "contribution_by": { "enum": ["party_a", "party_b", "joint"] }
            },
            "required": ["op"]
        }),
        required_args: &["op"],
        owned_tables: &[Table::BudgetItems],
        handler: handle,
    });
}

fn handle(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(op) = arg_str(args, "op") else {
        return WorkerOutcome::validation("op is required");
    };
    match op {
        "set" => set(ctx, args),
        "summary" => summary(ctx),
        "list" => list(ctx),
        other => WorkerOutcome::validation(format!("unknown budget op: {other}")),
    }
}

fn set(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(item_name) = arg_str(args, "item_name") else {
        return WorkerOutcome::validation("item_name is required");
    };
    let Some(amount_cents) = arg_i64(args, "amount_cents") else {
        return WorkerOutcome::validation("amount_cents is required");
    };
    if amount_cents < 0 {
        return WorkerOutcome::validation("amount_cents must not be negative");
    }
    let contribution_by = match arg_str(args, "contribution_by") {
        None => Party::Joint,
        Some(raw) => match Party::parse(raw) {
            Some(party) => party,
            None => return WorkerOutcome::validation("contribution_by must be a known party"),
        },
    };
    let request = BudgetUpsertRequest {
        item_name: item_name.to_string(),
        category: arg_str(args, "category").unwrap_or("general").to_string(),
        amount_cents,
        vendor_name: arg_str(args, "vendor_name").map(str::to_string),
        status: "planned".to_string(),
        contribution_by,
    };
    match ctx.store.budget_upsert_item(ctx.root, request) {
        Ok(row) => WorkerOutcome::success(
            format!(
                "Recorded {} at {:.2} under {}.",
                row.item_name,
                row.amount_cents as f64 / 100.0,
                row.category
            ),
            json!({ "item_id": row.id }),
        ),
        Err(err) => store_failure(err),
    }
}

fn summary(ctx: &mut WorkerCtx<'_>) -> WorkerOutcome {
    match ctx.store.budget_summary(ctx.root) {
        Ok(summary) => {
            if summary.item_count == 0 {
                return WorkerOutcome::domain("No budget items are recorded yet.");
            }
            WorkerOutcome::success(
                format!(
                    "{} budget item(s) totalling {:.2}.",
                    summary.item_count,
                    summary.total_cents as f64 / 100.0
                ),
                json!({
                    "item_count": summary.item_count,
                    "total_cents": summary.total_cents,
                }),
            )
        }
        Err(err) => store_failure(err),
    }
}

fn list(ctx: &mut WorkerCtx<'_>) -> WorkerOutcome {
    match ctx.store.budget_list(ctx.root, 50) {
        Ok(rows) => {
            let items: Vec<Value> = rows
                .iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "item": r.item_name,
                        "category": r.category,
                        "amount_cents": r.amount_cents,
                        "contribution_by": r.contribution_by.as_str(),
                        "status": r.status,
                    })
                })
                .collect();
            WorkerOutcome::success(format!("{} budget item(s).", items.len()), json!({ "items": items }))
        }
        Err(err) => store_failure(err),
    }
}
