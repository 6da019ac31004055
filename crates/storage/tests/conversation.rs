#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_storage::{CompactTurnsRequest, CreateRootRequest, FactAddRequest, SqliteStore};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("pl_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn seed_root(store: &mut SqliteStore) -> RootId {
    let row = store
        .create_root(CreateRootRequest {
            display_name: "A & B".to_string(),
            target_date_ms: None,
            details_json: "{}".to_string(),
        })
        .expect("create root");
    RootId::try_new(row.id).expect("root id")
}

#[test]
fn turn_counter_and_window_track_appends() {
    let mut store = SqliteStore::open(temp_dir("turn_counter")).expect("open store");
    let root = seed_root(&mut store);

    for i in 0..5 {
        store
            .append_turn(&root, "ana@example.com", &format!("message {i}"))
            .expect("append turn");
    }
    let state = store
        .conversation_state(&root)
        .expect("state")
        .expect("state exists");
    assert_eq!(state.turn_count, 5);
    assert_eq!(state.rolling_summary, "");

    let recent = store.recent_turns(&root, 3).expect("recent turns");
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].content, "message 2");
    assert_eq!(recent[2].content, "message 4");
}

#[test]
fn compaction_trims_window_and_overwrites_summary() {
    let mut store = SqliteStore::open(temp_dir("compaction")).expect("open store");
    let root = seed_root(&mut store);

    for i in 0..20 {
        store
            .append_turn(&root, "ana@example.com", &format!("message {i}"))
            .expect("append turn");
    }
    let dropped = store
        .compact_turns(
            &root,
            CompactTurnsRequest {
                keep_last: 4,
                rolling_summary: "venue shortlist settled; budget pending".to_string(),
            },
        )
        .expect("compact");
    assert_eq!(dropped, 16);
    assert_eq!(store.window_len(&root).expect("window len"), 4);

    let state = store
        .conversation_state(&root)
        .expect("state")
        .expect("state exists");
    assert_eq!(state.rolling_summary, "venue shortlist settled; budget pending");
    // The cumulative turn counter keeps counting; only the window shrinks.
    assert_eq!(state.turn_count, 20);

    let recent = store.recent_turns(&root, 10).expect("recent turns");
    assert_eq!(recent.len(), 4);
    assert_eq!(recent[0].content, "message 16");
}

#[test]
fn facts_are_append_only_and_capped_reads_return_newest_first() {
    let mut store = SqliteStore::open(temp_dir("facts")).expect("open store");
    let root = seed_root(&mut store);

    for i in 0..8 {
        store
            .add_fact(
                &root,
                FactAddRequest {
                    content: format!("fact {i}"),
                    embedding_json: "[0.0,1.0]".to_string(),
                    metadata_json: "{}".to_string(),
                },
            )
            .expect("add fact");
    }
    let facts = store.recent_facts(&root, 5).expect("recent facts");
    assert_eq!(facts.len(), 5);
    assert_eq!(facts[0].content, "fact 7");
}
