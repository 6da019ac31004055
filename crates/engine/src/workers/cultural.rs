#![forbid(unsafe_code)]

use super::arg_str;
use crate::router::{Table, WorkerCtx, WorkerName, WorkerOutcome, WorkerSpec, store_failure};
use pl_storage::RitualNoteAddRequest;
use serde_json::{Value, json};

pub(crate) fn register(specs: &mut Vec<WorkerSpec>) {
    specs.push(WorkerSpec {
        name: WorkerName::Cultural,
        description: "Consults the cultural knowledge source and keeps the ritual notes taken from it.",
        args_schema: json!({
            "type": "object",
            "properties": {
                "op": { "enum": ["lookup", "notes"] },
                "tradition": { "type": "string" },
                "topic": { "type": "string" }
            },
            "required": ["op"]
        }),
        required_args: &["op"],
        owned_tables: &[Table::RitualNotes],
        handler: handle,
    });
}

fn handle(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(op) = arg_str(args, "op") else {
        return WorkerOutcome::validation("op is required");
    };
    match op {
        "lookup" => lookup(ctx, args),
        "notes" => notes(ctx),
        other => WorkerOutcome::validation(format!("unknown cultural op: {other}")),
    }
}

fn lookup(ctx: &mut WorkerCtx<'_>, args: &Value) -> WorkerOutcome {
    let Some(tradition) = arg_str(args, "tradition") else {
        return WorkerOutcome::validation("tradition is required");
    };
    let Some(topic) = arg_str(args, "topic") else {
        return WorkerOutcome::validation("topic is required");
    };
    let Some(content) = ctx.knowledge.lookup(tradition, topic) else {
        return WorkerOutcome::domain(format!("No guidance found for {topic} in the {tradition} tradition."));
    };
    let request = RitualNoteAddRequest {
        tradition: tradition.to_string(),
        topic: topic.to_string(),
        content: content.clone(),
    };
    match ctx.store.ritual_note_add(ctx.root, request) {
        Ok(row) => WorkerOutcome::success(
            format!("Noted {} guidance on {}.", tradition, topic),
            json!({ "note_id": row.id, "content": content }),
        ),
        Err(err) => store_failure(err),
    }
}

fn notes(ctx: &mut WorkerCtx<'_>) -> WorkerOutcome {
    match ctx.store.ritual_notes_list(ctx.root, 50) {
        Ok(rows) => {
            if rows.is_empty() {
                return WorkerOutcome::domain("No ritual notes have been captured yet.");
            }
            let items: Vec<Value> = rows
                .iter()
                .map(|r| json!({ "id": r.id, "tradition": r.tradition, "topic": r.topic }))
                .collect();
            WorkerOutcome::success(format!("{} ritual note(s).", items.len()), json!({ "notes": items }))
        }
        Err(err) => store_failure(err),
    }
}
