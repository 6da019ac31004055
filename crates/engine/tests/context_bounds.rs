#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_core::model::Role;
use pl_engine::{AssemblerCaps, Engine, IntakeFirstParty, ScopeTag, TurnRequest, assemble_context};
use pl_engine::{HashEmbedder, KeywordReasoner, ReasoningCapability};
use pl_storage::{FactAddRequest, GuestAddRequest};
use serde_json::{Value, json};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("pl_engine_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn activated_engine(test_name: &str) -> (Engine, RootId) {
    let mut engine = Engine::open(temp_dir(test_name)).expect("open engine");
    let row = engine
        .intake_first_party(IntakeFirstParty {
            display_name: "A & B".to_string(),
            target_date_ms: Some(1_900_000_000_000),
            identity: "ana@example.com".to_string(),
            expected_partner: Some("ben@example.com".to_string()),
            details: json!({ "tradition": "garden" }),
        })
        .expect("first intake");
    let root = RootId::try_new(row.id).expect("root id");
    let outcome = engine
        .intake_second_party(&root, "ben@example.com", &json!({}))
        .expect("second intake");
    assert!(outcome.activated);
    (engine, root)
}

#[test]
fn payload_stays_within_caps_for_an_arbitrarily_long_history() {
    let (mut engine, root) = activated_engine("bounded_payload");
    let caps = AssemblerCaps {
        per_list: 5,
        recent_turns: 4,
        recall_facts: 3,
        ..AssemblerCaps::default()
    };

    {
        let store = engine.store_mut();
        for i in 0..30 {
            store
                .guest_add(
                    &root,
                    GuestAddRequest {
                        name: format!("Guest {i}"),
                        contact: None,
                        side: None,
                        dietary: None,
                    },
                )
                .expect("guest");
        }
        for i in 0..40 {
            store
                .append_turn(&root, "ana@example.com", &format!("old message {i}"))
                .expect("turn");
        }
        let embedder = HashEmbedder;
        use pl_engine::Embedder as _;
        for i in 0..25 {
            let content = format!("remembered detail {i} about venues");
            let embedding = embedder.embed(&content);
            store
                .add_fact(
                    &root,
                    FactAddRequest {
                        content,
                        embedding_json: serde_json::to_string(&embedding).expect("embedding"),
                        metadata_json: "{}".to_string(),
                    },
                )
                .expect("fact");
        }
    }

    let payload = assemble_context(
        engine.store(),
        &HashEmbedder,
        &caps,
        &root,
        "ana@example.com",
        Role::PrimaryA,
        "what about the venues we discussed",
        ScopeTag::FullFallback,
    )
    .expect("assemble");

    let list_len = |key: &str| payload[key].as_array().map(Vec::len).unwrap_or(0);
    assert!(list_len("guests") <= caps.per_list);
    assert!(list_len("tasks") <= caps.per_list);
    assert!(list_len("recent_turns") <= caps.recent_turns);
    assert!(list_len("recall_facts") <= caps.recall_facts);

    let truncated: Vec<&str> = payload["truncated"]
        .as_array()
        .expect("truncated list")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(truncated.contains(&"guests"), "guest overflow must be flagged");
}

#[test]
fn minimal_scope_skips_domain_slices() {
    let (engine, root) = activated_engine("minimal_scope");
    let payload = assemble_context(
        engine.store(),
        &HashEmbedder,
        &AssemblerCaps::default(),
        &root,
        "ana@example.com",
        Role::PrimaryA,
        "hello",
        ScopeTag::Minimal,
    )
    .expect("assemble");

    assert!(payload.get("guests").is_none());
    assert!(payload.get("shortlist").is_none());
    // Collaboration view and workflow saves always ride along.
    assert!(payload.get("collab_status").is_some());
    assert!(payload.get("workflows").is_some());
}

#[test]
fn classification_falls_back_to_minimal_on_noise() {
    let reasoner = KeywordReasoner;
    assert_eq!(reasoner.classify_intent(""), ScopeTag::Minimal);
    assert_eq!(reasoner.classify_intent("qwerty zxcvb"), ScopeTag::Minimal);
    assert_eq!(reasoner.classify_intent("find us a venue"), ScopeTag::Vendor);
    assert_eq!(
        reasoner.classify_intent("how much money is left"),
        ScopeTag::Budget
    );
}

#[test]
fn window_compacts_on_cadence_and_summary_becomes_recallable() {
    let (mut engine, root) = activated_engine("compaction");
    let caps = AssemblerCaps {
        recent_turns: 4,
        compact_every: 6,
        ..AssemblerCaps::default()
    };
    engine = engine.with_caps(caps);

    for i in 0..12 {
        let reply = engine.handle_turn(&TurnRequest {
            root: root.as_str().to_string(),
            identity: "ana@example.com".to_string(),
            message: format!("note number {i} about the venue shortlist"),
        });
        assert!(reply.ok, "turn {i} failed: {}", reply.text);
    }

    let state = engine
        .store()
        .conversation_state(&root)
        .expect("state")
        .expect("state exists");
    assert!(
        !state.rolling_summary.is_empty(),
        "compaction must have produced a summary"
    );
    let window = engine.store().window_len(&root).expect("window");
    assert!(
        window < state.turn_count,
        "collapsed turns must leave the window (window={window}, total={})",
        state.turn_count
    );
    let facts = engine.store().recent_facts(&root, 10).expect("facts");
    assert!(!facts.is_empty(), "the collapsed summary is stored for recall");
}
