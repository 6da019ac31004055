#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_core::model::{ApprovalPolicy, Party, TaskStatus};
use pl_engine::{EngineError, NoopNotifier, StateMachine, ValidationKind};
use pl_core::ladder::TransitionError;
use pl_storage::{
    CreateRootRequest, SetTaskStatusRequest, SqliteStore, StoreError, TaskCreateRequest,
};
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

fn seed_task(store: &mut SqliteStore) -> (RootId, String) {
    let row = store
        .create_root(CreateRootRequest {
            display_name: "A & B".to_string(),
            target_date_ms: None,
            details_json: "{}".to_string(),
        })
        .expect("create root");
    let root = RootId::try_new(row.id).expect("root id");
    let task = store
        .create_task(
            &root,
            TaskCreateRequest {
                workflow_id: None,
                title: "Select venue".to_string(),
                description: None,
                status: TaskStatus::NotStarted,
                owning_party: Party::Joint,
                approval_policy: ApprovalPolicy::DualParty,
                category: None,
                due_date_ms: None,
                due_offset_days: None,
                subject_ids_json: None,
            },
        )
        .expect("create task");
    (root, task.id)
}

/// Two members race the same advance. The loser's stale write is refused by
/// the revision check, and its automatic retry (now reading the advanced
/// row) lands on a deterministic illegal-transition answer instead of a
/// silent double-advance.
#[test]
fn racing_advance_is_refused_then_deterministically_rejected() {
    let mut store = SqliteStore::open(temp_dir("racing_advance")).expect("open store");
    let (root, task_id) = seed_task(&mut store);

    // Both callers read the task at revision 0.
    let stale_revision = store
        .get_task(&root, &task_id)
        .expect("read")
        .expect("task")
        .revision;

    // First caller wins.
    store
        .set_task_status(
            &root,
            SetTaskStatusRequest {
                id: task_id.clone(),
                expected_revision: Some(stale_revision),
                status: TaskStatus::PendingReview,
                subject_ids_json: None,
                event_type: "task.status".to_string(),
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("first writer");

    // Second caller's stale write loses with the concurrency signal...
    let err = store
        .set_task_status(
            &root,
            SetTaskStatusRequest {
                id: task_id.clone(),
                expected_revision: Some(stale_revision),
                status: TaskStatus::PendingReview,
                subject_ids_json: None,
                event_type: "task.status".to_string(),
                event_payload_json: "{}".to_string(),
            },
        )
        .expect_err("stale writer");
    match err {
        StoreError::RevisionMismatch { expected, actual } => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected RevisionMismatch, got {other:?}"),
    }

    // ...and the machine-level retry with a fresh read reports the ladder
    // violation, not a second advance.
    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);
    let err = machine
        .advance_task(&root, &task_id, TaskStatus::PendingReview)
        .expect_err("already past that state");
    match err {
        EngineError::Validation(ValidationKind::Transition(
            TransitionError::IllegalTaskTransition { from, to },
        )) => {
            assert_eq!(from, TaskStatus::PendingReview);
            assert_eq!(to, TaskStatus::PendingReview);
        }
        other => panic!("expected IllegalTaskTransition, got {other:?}"),
    }

    let task = store.get_task(&root, &task_id).expect("read").expect("task");
    assert_eq!(task.status, TaskStatus::PendingReview, "no double-advance");
}

#[test]
fn updates_to_different_tasks_need_no_coordination() {
    let mut store = SqliteStore::open(temp_dir("independent_tasks")).expect("open store");
    let (root, first_id) = seed_task(&mut store);
    let second = store
        .create_task(
            &root,
            TaskCreateRequest {
                workflow_id: None,
                title: "Book caterer".to_string(),
                description: None,
                status: TaskStatus::NotStarted,
                owning_party: Party::Joint,
                approval_policy: ApprovalPolicy::DualParty,
                category: None,
                due_date_ms: None,
                due_offset_days: None,
                subject_ids_json: None,
            },
        )
        .expect("second task");

    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);
    machine
        .advance_task(&root, &first_id, TaskStatus::PendingReview)
        .expect("advance first");
    machine
        .advance_task(&root, &second.id, TaskStatus::PendingReview)
        .expect("advance second");
}

#[test]
fn recompute_deadlines_requires_a_target_date() {
    let mut store = SqliteStore::open(temp_dir("recompute_guard")).expect("open store");
    let (root, _task_id) = seed_task(&mut store);

    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);
    let err = machine
        .recompute_deadlines(&root)
        .expect_err("no target date");
    match err {
        EngineError::Validation(ValidationKind::MissingTargetDate) => {}
        other => panic!("expected MissingTargetDate, got {other:?}"),
    }
}

#[test]
fn deadlines_stay_frozen_until_explicitly_recomputed() {
    let mut store = SqliteStore::open(temp_dir("frozen_deadlines")).expect("open store");
    let target = 1_900_000_000_000i64;
    let row = store
        .create_root(CreateRootRequest {
            display_name: "A & B".to_string(),
            target_date_ms: Some(target),
            details_json: "{}".to_string(),
        })
        .expect("create root");
    let root = RootId::try_new(row.id).expect("root id");
    let offset_days = 30i64;
    let day_ms = 86_400_000i64;
    let task = store
        .create_task(
            &root,
            TaskCreateRequest {
                workflow_id: None,
                title: "Send invitations".to_string(),
                description: None,
                status: TaskStatus::NotStarted,
                owning_party: Party::Joint,
                approval_policy: ApprovalPolicy::NoApproval,
                category: None,
                due_date_ms: Some(target - offset_days * day_ms),
                due_offset_days: Some(offset_days),
                subject_ids_json: None,
            },
        )
        .expect("create task");

    // The target date moves; stored deadlines must not.
    let new_target = target + 14 * day_ms;
    let mut root_row = store.get_root(&root).expect("get root").expect("root");
    store
        .set_root_details(&root, Some(root_row.revision), &root_row.details_json)
        .expect("touch details");
    root_row = store.get_root(&root).expect("get root").expect("root");
    let unchanged = store.get_task(&root, &task.id).expect("get").expect("task");
    assert_eq!(unchanged.due_date_ms, Some(target - offset_days * day_ms));

    // Explicit recompute picks up the current target date.
    store
        .set_root_target_date(&root, Some(root_row.revision), Some(new_target))
        .expect("set target date");
    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);
    let updated = machine.recompute_deadlines(&root).expect("recompute");
    assert_eq!(updated, 1);
    let task = store.get_task(&root, &task.id).expect("get").expect("task");
    assert_eq!(task.due_date_ms, Some(new_target - offset_days * day_ms));
}
