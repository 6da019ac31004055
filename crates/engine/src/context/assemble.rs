#![forbid(unsafe_code)]

use super::{AssemblerCaps, ScopeTag};
use crate::capabilities::{Embedder, cosine};
use crate::error::EngineError;
use crate::support::{compact_fact, ts_ms_to_rfc3339};
use pl_core::ids::RootId;
use pl_core::model::{Role, TaskStatus};
use pl_storage::{SqliteStore, TaskListRequest};
use serde_json::{Map, Value, json};

/// Build the flat context payload for one turn. Every list is capped;
/// truncated slices are named in the payload's `truncated` array so the
/// reasoning engine knows the view is partial.
pub fn assemble_context(
    store: &SqliteStore,
    embedder: &dyn Embedder,
    caps: &AssemblerCaps,
    root: &RootId,
    identity: &str,
    role: Role,
    message: &str,
    scope: ScopeTag,
) -> Result<Value, EngineError> {
    let map_err = |err| EngineError::from_store(err, "the plan");

    let root_row = store
        .get_root(root)
        .map_err(map_err)?
        .ok_or_else(|| EngineError::from_store(pl_storage::StoreError::UnknownRoot, "the plan"))?;

    let mut payload = Map::new();
    let mut truncated: Vec<String> = Vec::new();

    payload.insert("root".to_string(), json!(root.as_str()));
    payload.insert("scope".to_string(), json!(scope.as_str()));
    payload.insert("message".to_string(), json!(message));
    payload.insert(
        "member".to_string(),
        json!({ "identity": identity, "role": role.as_str() }),
    );
    payload.insert("root_status".to_string(), json!(root_row.status.as_str()));
    payload.insert("display_name".to_string(), json!(root_row.display_name));
    payload.insert(
        "target_date".to_string(),
        match root_row.target_date_ms {
            Some(ts) => json!(ts_ms_to_rfc3339(ts)),
            None => Value::Null,
        },
    );

    // Collaboration view and workflow save files ride along on every scope;
    // they are what make an arbitrary-length pause resumable.
    let collab = store.collab_status(root).map_err(map_err)?;
    payload.insert(
        "collab_status".to_string(),
        json!({
            "party_a": counters_json(&collab.party_a),
            "party_b": counters_json(&collab.party_b),
            "joint": counters_json(&collab.joint),
        }),
    );

    let workflows = store
        .list_active_workflows(root, caps.workflow_saves)
        .map_err(map_err)?;
    let workflow_saves: Vec<Value> = workflows
        .iter()
        .map(|w| {
            let summary = w
                .context_summary_json
                .as_deref()
                .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
                .unwrap_or(Value::Null);
            json!({
                "workflow_id": w.id,
                "name": w.name,
                "status": w.status.as_str(),
                "summary": summary,
                "related_ids": serde_json::from_str::<Value>(&w.related_ids_json)
                    .unwrap_or_else(|_| json!([])),
                "updated_at": ts_ms_to_rfc3339(w.updated_at_ms),
            })
        })
        .collect();
    payload.insert("workflows".to_string(), Value::Array(workflow_saves));

    // Scope-specific slices.
    match scope {
        ScopeTag::Vendor => {
            insert_tasks(store, root, caps, Some("vendor"), &mut payload, &mut truncated)?;
            insert_shortlist(store, root, caps, &mut payload, &mut truncated)?;
            insert_bookings(store, root, caps, &mut payload, &mut truncated)?;
        }
        ScopeTag::Budget => {
            insert_budget(store, root, caps, &mut payload, &mut truncated)?;
        }
        ScopeTag::Guest => {
            insert_guests(store, root, caps, &mut payload, &mut truncated)?;
        }
        ScopeTag::Timeline => {
            insert_tasks(store, root, caps, None, &mut payload, &mut truncated)?;
            insert_timeline(store, root, caps, &mut payload, &mut truncated)?;
        }
        ScopeTag::Minimal => {}
        ScopeTag::FullFallback => {
            insert_tasks(store, root, caps, None, &mut payload, &mut truncated)?;
            insert_shortlist(store, root, caps, &mut payload, &mut truncated)?;
            insert_bookings(store, root, caps, &mut payload, &mut truncated)?;
            insert_budget(store, root, caps, &mut payload, &mut truncated)?;
            insert_guests(store, root, caps, &mut payload, &mut truncated)?;
            insert_timeline(store, root, caps, &mut payload, &mut truncated)?;
        }
    }

    // Rolling summary plus the last K raw turns.
    let state = store.conversation_state(root).map_err(map_err)?;
    let (rolling_summary, turn_count) = match state {
        Some(state) => (state.rolling_summary, state.turn_count),
        None => (String::new(), 0),
    };
    payload.insert("rolling_summary".to_string(), json!(rolling_summary));
    payload.insert("turn_count".to_string(), json!(turn_count));

    let turns = store.recent_turns(root, caps.recent_turns).map_err(map_err)?;
    payload.insert(
        "recent_turns".to_string(),
        Value::Array(
            turns
                .iter()
                .map(|t| json!({ "speaker": t.speaker, "content": t.content }))
                .collect(),
        ),
    );

    // Top-M recalled facts by similarity to this message.
    let facts = recall_facts(store, embedder, caps, root, message)?;
    payload.insert("recall_facts".to_string(), Value::Array(facts));

    payload.insert(
        "truncated".to_string(),
        Value::Array(truncated.into_iter().map(Value::String).collect()),
    );
    Ok(Value::Object(payload))
}

fn counters_json(counters: &pl_storage::PartyCounters) -> Value {
    json!({
        "open": counters.open,
        "pending_review": counters.pending_review,
        "pending_final_approval": counters.pending_final_approval,
    })
}

fn cap_slice<T>(mut rows: Vec<T>, caps: &AssemblerCaps, name: &str, truncated: &mut Vec<String>) -> Vec<T> {
    if rows.len() > caps.per_list {
        rows.truncate(caps.per_list);
        truncated.push(name.to_string());
    }
    rows
}

fn insert_tasks(
    store: &SqliteStore,
    root: &RootId,
    caps: &AssemblerCaps,
    category: Option<&str>,
    payload: &mut Map<String, Value>,
    truncated: &mut Vec<String>,
) -> Result<(), EngineError> {
    let rows = store
        .list_tasks(
            root,
            TaskListRequest {
                limit: caps.per_list * 4,
                ..TaskListRequest::default()
            },
        )
        .map_err(|err| EngineError::from_store(err, "tasks"))?;
    let open: Vec<_> = rows
        .into_iter()
        .filter(|t| t.status != TaskStatus::Completed)
        .filter(|t| category.is_none_or(|c| t.category.as_deref() == Some(c)))
        .collect();
    let open = cap_slice(open, caps, "tasks", truncated);
    payload.insert(
        "tasks".to_string(),
        Value::Array(
            open.iter()
                .map(|t| {
                    json!({
                        "id": t.id,
                        "title": t.title,
                        "status": t.status.as_str(),
                        "owner": t.owning_party.as_str(),
                        "approval": t.approval_policy.as_str(),
                        "due_date": t.due_date_ms.map(ts_ms_to_rfc3339),
                        "subject_ids": serde_json::from_str::<Value>(&t.subject_ids_json)
                            .unwrap_or_else(|_| json!([])),
                    })
                })
                .collect(),
        ),
    );
    Ok(())
}

fn insert_shortlist(
    store: &SqliteStore,
    root: &RootId,
    caps: &AssemblerCaps,
    payload: &mut Map<String, Value>,
    truncated: &mut Vec<String>,
) -> Result<(), EngineError> {
    let rows = store
        .shortlist_list(root, caps.per_list + 1)
        .map_err(|err| EngineError::from_store(err, "shortlist"))?;
    let rows = cap_slice(rows, caps, "shortlist", truncated);
    payload.insert(
        "shortlist".to_string(),
        Value::Array(
            rows.iter()
                .map(|r| json!({ "id": r.id, "vendor": r.vendor_name, "category": r.category, "status": r.status }))
                .collect(),
        ),
    );
    Ok(())
}

fn insert_bookings(
    store: &SqliteStore,
    root: &RootId,
    caps: &AssemblerCaps,
    payload: &mut Map<String, Value>,
    truncated: &mut Vec<String>,
) -> Result<(), EngineError> {
    let rows = store
        .bookings_list(root, caps.per_list + 1)
        .map_err(|err| EngineError::from_store(err, "bookings"))?;
    let rows = cap_slice(rows, caps, "bookings", truncated);
    payload.insert(
        "bookings".to_string(),
        Value::Array(
            rows.iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "vendor": r.vendor_name,
                        "status": r.status,
                        "event_date": ts_ms_to_rfc3339(r.event_date_ms),
                    })
                })
                .collect(),
        ),
    );
    Ok(())
}

fn insert_budget(
    store: &SqliteStore,
    root: &RootId,
    caps: &AssemblerCaps,
    payload: &mut Map<String, Value>,
    truncated: &mut Vec<String>,
) -> Result<(), EngineError> {
    let rows = store
        .budget_list(root, caps.per_list + 1)
        .map_err(|err| EngineError::from_store(err, "budget"))?;
    let rows = cap_slice(rows, caps, "budget_items", truncated);
    let summary = store
        .budget_summary(root)
        .map_err(|err| EngineError::from_store(err, "budget"))?;
    payload.insert(
        "budget_items".to_string(),
        Value::Array(
            rows.iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "item": r.item_name,
                        "category": r.category,
                        "amount_cents": r.amount_cents,
                        "contribution_by": r.contribution_by.as_str(),
                    })
                })
                .collect(),
        ),
    );
    payload.insert("budget_total_cents".to_string(), json!(summary.total_cents));
    Ok(())
}

fn insert_guests(
    store: &SqliteStore,
    root: &RootId,
    caps: &AssemblerCaps,
    payload: &mut Map<String, Value>,
    truncated: &mut Vec<String>,
) -> Result<(), EngineError> {
    let rows = store
        .guest_list(root, caps.per_list + 1)
        .map_err(|err| EngineError::from_store(err, "guests"))?;
    let rows = cap_slice(rows, caps, "guests", truncated);
    payload.insert(
        "guests".to_string(),
        Value::Array(
            rows.iter()
                .map(|r| json!({ "id": r.id, "name": r.name, "side": r.side.map(|p| p.as_str()), "status": r.status }))
                .collect(),
        ),
    );
    Ok(())
}

fn insert_timeline(
    store: &SqliteStore,
    root: &RootId,
    caps: &AssemblerCaps,
    payload: &mut Map<String, Value>,
    truncated: &mut Vec<String>,
) -> Result<(), EngineError> {
    let rows = store
        .timeline_list(root, caps.per_list + 1)
        .map_err(|err| EngineError::from_store(err, "timeline"))?;
    let rows = cap_slice(rows, caps, "timeline", truncated);
    payload.insert(
        "timeline".to_string(),
        Value::Array(
            rows.iter()
                .map(|r| json!({ "id": r.id, "name": r.name, "at": ts_ms_to_rfc3339(r.at_ms) }))
                .collect(),
        ),
    );
    Ok(())
}

fn recall_facts(
    store: &SqliteStore,
    embedder: &dyn Embedder,
    caps: &AssemblerCaps,
    root: &RootId,
    message: &str,
) -> Result<Vec<Value>, EngineError> {
    if message.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows = store
        .recent_facts(root, caps.fact_scan)
        .map_err(|err| EngineError::from_store(err, "recall"))?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let query = embedder.embed(message);
    let mut scored: Vec<(f32, &pl_storage::FactRow)> = rows
        .iter()
        .map(|row| {
            let embedding: Vec<f32> =
                serde_json::from_str(&row.embedding_json).unwrap_or_default();
            (cosine(&query, &embedding), row)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(scored
        .into_iter()
        .take(caps.recall_facts)
        .map(|(_, row)| Value::String(compact_fact(&row.content, caps.fact_max_chars)))
        .collect())
}
