#![forbid(unsafe_code)]

use super::arg_str;
use crate::router::{Table, WorkerCtx, WorkerName, WorkerOutcome, WorkerSpec, store_failure};
use pl_storage::BoardAddRequest;
use serde_json::{Value, json};

pub(crate) fn register(specs: &mut Vec<WorkerSpec>) {
    specs.push(WorkerSpec {
        name: WorkerName::Creative,
        description: "Collects inspiration board items for themes and decor.",
        args_schema: json!({
            "type": "object",
            "properties": {
                "op": { "enum": ["board.add", "board.list"] },
                "note": { "type": "string" },
                "category": { "type": "string" },
                "image_ref": { "type": "string" }
            },
            "required": ["op"]
        }),
        required_args: &["op"],
        owned_tables: &[Table::BoardItems],
        handler: handle,
    });
}

fn handle(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(op) = arg_str(args, "op") else {
        return WorkerOutcome::validation("op is required");
    };
    match op {
        "board.add" => add(ctx, args),
        "board.list" => list(ctx),
        other => WorkerOutcome::validation(format!("unknown creative op: {other}")),
    }
}

fn add(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let note = arg_str(args, "note").map(str::to_string);
    let image_ref = arg_str(args, "image_ref").map(str::to_string);
    if note.is_none() && image_ref.is_none() {
        return WorkerOutcome::validation("a board item needs a note or an image_ref");
    }
    let request = BoardAddRequest {
        note,
        category: arg_str(args, "category").unwrap_or("decor").to_string(),
        image_ref,
    };
    match ctx.store.board_add_item(ctx.root, request) {
        Ok(row) => WorkerOutcome::success(
            format!("Pinned a {} idea to the board.", row.category),
            json!({ "item_id": row.id }),
        ),
        Err(err) => store_failure(err),
    }
}

fn list(ctx: &mut WorkerCtx<'_>) -> WorkerOutcome {
    match ctx.store.board_list(ctx.root, 50) {
        Ok(rows) => {
            if rows.is_empty() {
                return WorkerOutcome::domain("The inspiration board is empty so far.");
            }
            let items: Vec<Value> = rows
                .iter()
                .map(|r| json!({ "id": r.id, "note": r.note, "category": r.category }))
                .collect();
            WorkerOutcome::success(format!("{} board item(s).", items.len()), json!({ "items": items }))
        }
        Err(err) => store_failure(err),
    }
}
