#![forbid(unsafe_code)]

use super::AssemblerCaps;
use crate::capabilities::{Embedder, ReasoningCapability};
use crate::error::EngineError;
use pl_core::ids::RootId;
use pl_storage::{CompactTurnsRequest, FactAddRequest, SqliteStore};
use serde_json::json;

const WINDOW_FETCH: usize = 512;

/// Once N turns have accumulated past the carry window, collapse everything
/// but the newest K turns into the rolling summary and persist the summary
/// as a recallable fact. Each compaction resets the window to K, so the
/// collapse fires every N turns and the window stays bounded regardless of
/// root age.
pub(crate) fn maybe_compact(
    store: &mut SqliteStore,
    reasoning: &dyn ReasoningCapability,
    embedder: &dyn Embedder,
    caps: &AssemblerCaps,
    root: &RootId,
) -> Result<bool, EngineError> {
    let map_err = |err| EngineError::from_store(err, "conversation");

    let Some(state) = store.conversation_state(root).map_err(map_err)? else {
        return Ok(false);
    };
    if caps.compact_every == 0 || state.turn_count == 0 {
        return Ok(false);
    }

    let window = store.recent_turns(root, WINDOW_FETCH).map_err(map_err)?;
    if window.len() < caps.recent_turns + caps.compact_every {
        return Ok(false);
    }
    let collapse = &window[..window.len() - caps.recent_turns];
    let summary = reasoning.summarize(&state.rolling_summary, collapse);

    store
        .compact_turns(
            root,
            CompactTurnsRequest {
                keep_last: caps.recent_turns,
                rolling_summary: summary.clone(),
            },
        )
        .map_err(map_err)?;

    // The collapsed summary doubles as long-horizon memory.
    let embedding = embedder.embed(&summary);
    store
        .add_fact(
            root,
            FactAddRequest {
                content: summary,
                embedding_json: serde_json::to_string(&embedding)
                    .unwrap_or_else(|_| "[]".to_string()),
                metadata_json: json!({ "type": "rolling_summary" }).to_string(),
            },
        )
        .map_err(map_err)?;
    Ok(true)
}
