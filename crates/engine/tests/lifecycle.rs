#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_core::model::WorkflowStatus;
use pl_engine::{ContextSummary, EngineError, NoopNotifier, StateMachine, ValidationKind};
use pl_storage::{CreateRootRequest, SqliteStore};
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

fn seed_root(store: &mut SqliteStore) -> RootId {
    let row = store
        .create_root(CreateRootRequest {
            display_name: "A & B".to_string(),
            target_date_ms: Some(1_900_000_000_000),
            details_json: "{}".to_string(),
        })
        .expect("create root");
    RootId::try_new(row.id).expect("root id")
}

#[test]
fn pause_resume_round_trip_returns_summary_verbatim() {
    let mut store = SqliteStore::open(temp_dir("pause_resume")).expect("open store");
    let root = seed_root(&mut store);
    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);

    let wf = machine.start_workflow(&root, "venue_booking").expect("start");
    assert_eq!(wf.status, WorkflowStatus::NotStarted);

    let started = machine
        .note_workflow_action(&root, &wf.id)
        .expect("first action");
    assert_eq!(started.status, WorkflowStatus::InProgress);

    let summary = ContextSummary {
        current_stage: Some("shortlisting".to_string()),
        stage_goal: Some("pick a venue".to_string()),
        summary_text: Some("three candidates gathered".to_string()),
        next_possible_actions: vec!["visit venues".to_string()],
        contextual_data: json!({ "shortlist": ["V1", "V2", "V3"] }),
    };
    let paused = machine
        .pause_workflow(&root, &wf.id, &summary, &["TASK-001".to_string()], false)
        .expect("pause");
    assert_eq!(paused.status, WorkflowStatus::Paused);

    // No duplicate may appear while the instance sits paused.
    let err = machine
        .start_workflow(&root, "venue_booking")
        .expect_err("duplicate while paused");
    match err {
        EngineError::Validation(ValidationKind::DuplicateActiveWorkflow { name }) => {
            assert_eq!(name, "venue_booking");
        }
        other => panic!("expected DuplicateActiveWorkflow, got {other:?}"),
    }

    // Resume may happen weeks later; the save file must come back verbatim.
    let restored = machine.resume_workflow(&root, &wf.id).expect("resume");
    assert_eq!(restored, summary);

    // Resuming an already-running workflow is a no-op that reports state.
    let again = machine.resume_workflow(&root, &wf.id).expect("resume again");
    assert_eq!(again, summary);
}

#[test]
fn awaiting_feedback_is_a_pause_expecting_a_response() {
    let mut store = SqliteStore::open(temp_dir("awaiting")).expect("open store");
    let root = seed_root(&mut store);
    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);

    let wf = machine.start_workflow(&root, "caterer_booking").expect("start");
    machine.note_workflow_action(&root, &wf.id).expect("action");
    let parked = machine
        .pause_workflow(&root, &wf.id, &ContextSummary::default(), &[], true)
        .expect("pause awaiting feedback");
    assert_eq!(parked.status, WorkflowStatus::AwaitingFeedback);

    machine.resume_workflow(&root, &wf.id).expect("resume");
    let resumed = store
        .get_workflow(&root, &wf.id)
        .expect("get workflow")
        .expect("workflow");
    assert_eq!(resumed.status, WorkflowStatus::InProgress);
}

#[test]
fn terminal_outcomes_are_idempotent_but_exclusive() {
    let mut store = SqliteStore::open(temp_dir("terminal")).expect("open store");
    let root = seed_root(&mut store);
    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);

    let wf = machine.start_workflow(&root, "venue_booking").expect("start");
    machine.note_workflow_action(&root, &wf.id).expect("action");

    machine.complete_workflow(&root, &wf.id).expect("complete");
    // Same outcome twice: a no-op that still reports success.
    machine.complete_workflow(&root, &wf.id).expect("complete again");

    let err = machine
        .fail_workflow(&root, &wf.id, "changed our minds")
        .expect_err("conflicting outcome");
    match err {
        EngineError::Validation(ValidationKind::Transition(_)) => {}
        other => panic!("expected transition error, got {other:?}"),
    }

    // Once the old instance is terminal, the name is free again.
    machine
        .start_workflow(&root, "venue_booking")
        .expect("fresh instance after completion");
}

#[test]
fn pause_requires_an_in_flight_workflow() {
    let mut store = SqliteStore::open(temp_dir("pause_guard")).expect("open store");
    let root = seed_root(&mut store);
    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);

    let wf = machine.start_workflow(&root, "venue_booking").expect("start");
    let err = machine
        .pause_workflow(&root, &wf.id, &ContextSummary::default(), &[], false)
        .expect_err("pause from not_started");
    match err {
        EngineError::Validation(ValidationKind::Transition(_)) => {}
        other => panic!("expected transition error, got {other:?}"),
    }
}
