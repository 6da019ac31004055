#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_core::model::{RootStatus, TaskStatus, WorkflowStatus};
use pl_engine::{
    CatalogVendor, Engine, EngineError, IntakeFirstParty, StaticCatalog, TurnRequest,
    ValidationKind,
};
use pl_storage::TaskListRequest;
use serde_json::json;
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

fn catalog() -> StaticCatalog {
    StaticCatalog {
        vendors: vec![
            CatalogVendor {
                name: "Grand Palace".to_string(),
                category: "venue".to_string(),
                city: Some("Jaipur".to_string()),
                rating: Some(4.6),
                price_cents: Some(80_000_00),
            },
            CatalogVendor {
                name: "Riverside Lawns".to_string(),
                category: "venue".to_string(),
                city: Some("Pune".to_string()),
                rating: Some(4.2),
                price_cents: Some(45_000_00),
            },
        ],
    }
}

fn engine(test_name: &str) -> Engine {
    Engine::open(temp_dir(test_name))
        .expect("open engine")
        .with_catalog(Box::new(catalog()))
}

fn intake_both(engine: &mut Engine) -> RootId {
    let row = engine
        .intake_first_party(IntakeFirstParty {
            display_name: "A & B".to_string(),
            target_date_ms: Some(1_900_000_000_000),
            identity: "ana@example.com".to_string(),
            expected_partner: Some("ben@example.com".to_string()),
            details: json!({ "style": "garden" }),
        })
        .expect("first intake");
    let root = RootId::try_new(row.id).expect("root id");
    let outcome = engine
        .intake_second_party(&root, "ben@example.com", &json!({}))
        .expect("second intake");
    assert!(outcome.activated);
    root
}

#[test]
fn intake_activates_on_quorum_and_provisions_templates() {
    let mut engine = engine("intake_provision");
    let row = engine
        .intake_first_party(IntakeFirstParty {
            display_name: "A & B".to_string(),
            target_date_ms: Some(1_900_000_000_000),
            identity: "ana@example.com".to_string(),
            expected_partner: Some("ben@example.com".to_string()),
            details: json!({}),
        })
        .expect("first intake");
    let root = RootId::try_new(row.id).expect("root id");

    // One partner alone is not quorum.
    let before = engine
        .store()
        .get_root(&root)
        .expect("get root")
        .expect("root");
    assert_eq!(before.status, RootStatus::Onboarding);

    // The wrong identity cannot claim the open seat.
    let err = engine
        .intake_second_party(&root, "mallory@example.com", &json!({}))
        .expect_err("identity mismatch");
    match err {
        EngineError::Validation(ValidationKind::IntakeMismatch { expected }) => {
            assert_eq!(expected.as_deref(), Some("ben@example.com"));
        }
        other => panic!("expected IntakeMismatch, got {other:?}"),
    }

    let outcome = engine
        .intake_second_party(&root, "ben@example.com", &json!({}))
        .expect("second intake");
    assert!(outcome.activated);

    let after = engine
        .store()
        .get_root(&root)
        .expect("get root")
        .expect("root");
    assert_eq!(after.status, RootStatus::Active);

    let workflows = engine
        .store()
        .list_active_workflows(&root, 20)
        .expect("workflows");
    // Freshly provisioned workflows sit in not_started (outside the active
    // set); confirm they exist by name instead.
    assert!(workflows.is_empty());
    let tasks = engine
        .store()
        .list_tasks(
            &root,
            TaskListRequest {
                limit: 50,
                ..TaskListRequest::default()
            },
        )
        .expect("tasks");
    assert_eq!(tasks.len(), 7);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::NotStarted));
    assert!(tasks.iter().all(|t| t.due_date_ms.is_some()));
}

#[test]
fn vendor_turn_searches_catalog_and_replies() {
    let mut engine = engine("vendor_turn");
    let root = intake_both(&mut engine);

    let reply = engine.handle_turn(&TurnRequest {
        root: root.as_str().to_string(),
        identity: "ana@example.com".to_string(),
        message: "can you find us a venue in Jaipur".to_string(),
    });
    assert!(reply.ok, "reply failed: {}", reply.text);
    assert_eq!(reply.scope, "vendor");
    let vendors = reply.data["vendors"].as_array().expect("vendors");
    assert_eq!(vendors.len(), 2);
}

#[test]
fn budget_turn_with_no_items_is_a_domain_answer_not_an_error() {
    let mut engine = engine("budget_turn");
    let root = intake_both(&mut engine);

    let reply = engine.handle_turn(&TurnRequest {
        root: root.as_str().to_string(),
        identity: "ben@example.com".to_string(),
        message: "how is our budget looking".to_string(),
    });
    assert!(reply.ok);
    assert_eq!(reply.scope, "budget");
    assert!(reply.text.contains("No budget items"));
}

#[test]
fn non_member_turns_are_refused_with_a_defined_reply() {
    let mut engine = engine("non_member");
    let root = intake_both(&mut engine);

    let reply = engine.handle_turn(&TurnRequest {
        root: root.as_str().to_string(),
        identity: "mallory@example.com".to_string(),
        message: "show me everything".to_string(),
    });
    assert!(!reply.ok);
    assert!(reply.text.contains("not registered"));
}

#[test]
fn unknown_root_still_gets_an_answer() {
    let mut engine = engine("unknown_root");
    let reply = engine.handle_turn(&TurnRequest {
        root: "ROOT-999".to_string(),
        identity: "ana@example.com".to_string(),
        message: "hello".to_string(),
    });
    assert!(!reply.ok);
    assert!(!reply.text.is_empty());
}

#[test]
fn small_talk_gets_a_status_reply_without_worker_dispatch() {
    let mut engine = engine("small_talk");
    let root = intake_both(&mut engine);

    let reply = engine.handle_turn(&TurnRequest {
        root: root.as_str().to_string(),
        identity: "ana@example.com".to_string(),
        message: "good morning".to_string(),
    });
    assert!(reply.ok);
    assert_eq!(reply.scope, "minimal");
    assert!(reply.text.contains("where things stand"));
}

#[test]
fn turns_are_recorded_on_both_sides_of_the_conversation() {
    let mut engine = engine("recorded_turns");
    let root = intake_both(&mut engine);

    engine.handle_turn(&TurnRequest {
        root: root.as_str().to_string(),
        identity: "ana@example.com".to_string(),
        message: "find us a venue".to_string(),
    });
    let turns = engine.store().recent_turns(&root, 10).expect("turns");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].speaker, "ana@example.com");
    assert_eq!(turns[1].speaker, "assistant");
}

#[test]
fn workflow_save_survives_between_processes() {
    let dir = temp_dir("process_restart");
    let root;
    {
        let mut engine = Engine::open(&dir).expect("open engine");
        root = intake_both(&mut engine);
        let mut machine = engine.machine();
        let wf = machine.start_workflow(&root, "honeymoon_planning").expect("start");
        machine.note_workflow_action(&root, &wf.id).expect("action");
        machine
            .pause_workflow(
                &root,
                &wf.id,
                &pl_engine::ContextSummary {
                    summary_text: Some("two destinations compared".to_string()),
                    contextual_data: json!({ "finalists": ["Bali", "Lisbon"] }),
                    ..pl_engine::ContextSummary::default()
                },
                &[],
                false,
            )
            .expect("pause");
    }

    // A brand-new process picks the save file back up from the store alone.
    let mut engine = Engine::open(&dir).expect("reopen engine");
    let workflows = engine
        .store()
        .list_active_workflows(&root, 10)
        .expect("workflows");
    let wf = workflows
        .iter()
        .find(|w| w.name == "honeymoon_planning")
        .expect("paused workflow visible");
    assert_eq!(wf.status, WorkflowStatus::Paused);

    let summary = engine
        .machine()
        .resume_workflow(&root, &wf.id)
        .expect("resume in new process");
    assert_eq!(
        summary.contextual_data,
        json!({ "finalists": ["Bali", "Lisbon"] })
    );
}
