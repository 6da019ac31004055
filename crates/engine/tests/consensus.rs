#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_core::model::{ApprovalOutcome, ApprovalPolicy, Party, TaskStatus};
use pl_engine::{EngineError, NoopNotifier, StateMachine, ValidationKind};
use pl_storage::{CreateRootRequest, FeedbackAddRequest, SqliteStore, TaskCreateRequest};
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

fn seed_joint_task(store: &mut SqliteStore) -> (RootId, String) {
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
                category: Some("vendor".to_string()),
                due_date_ms: None,
                due_offset_days: None,
                subject_ids_json: None,
            },
        )
        .expect("create task");
    (root, task.id)
}

#[test]
fn both_approvals_complete_the_task_automatically() {
    let mut store = SqliteStore::open(temp_dir("dual_complete")).expect("open store");
    let (root, task_id) = seed_joint_task(&mut store);
    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);

    machine
        .advance_task(&root, &task_id, TaskStatus::PendingReview)
        .expect("submit options");
    let proposed = machine
        .propose_final_choice(&root, &task_id, &["SL-001".to_string()])
        .expect("propose final");
    assert_eq!(proposed.status, TaskStatus::PendingFinalApproval);

    let first = machine
        .record_approval(&root, &task_id, Party::PartyA, ApprovalOutcome::Approved, None)
        .expect("party A approves");
    assert!(!first.fully_approved);
    assert_eq!(first.task_status, TaskStatus::PendingFinalApproval);

    let second = machine
        .record_approval(&root, &task_id, Party::PartyB, ApprovalOutcome::Approved, None)
        .expect("party B approves");
    assert!(second.fully_approved);
    assert_eq!(second.task_status, TaskStatus::Completed);
}

#[test]
fn rejection_reverts_and_keeps_feedback_across_cycles() {
    let mut store = SqliteStore::open(temp_dir("reject_cycle")).expect("open store");
    let (root, task_id) = seed_joint_task(&mut store);

    {
        let notifier = NoopNotifier;
        let mut machine = StateMachine::new(&mut store, &notifier);
        machine
            .advance_task(&root, &task_id, TaskStatus::PendingReview)
            .expect("submit options");
        machine
            .propose_final_choice(&root, &task_id, &["SL-002".to_string()])
            .expect("propose final");
        machine
            .record_approval(&root, &task_id, Party::PartyA, ApprovalOutcome::Approved, None)
            .expect("party A approves");
    }

    store
        .add_task_feedback(
            &root,
            FeedbackAddRequest {
                task_id: task_id.clone(),
                author: "ben@example.com".to_string(),
                kind: "concern".to_string(),
                content: "parking concerns".to_string(),
            },
        )
        .expect("feedback");

    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);
    let rejected = machine
        .record_approval(&root, &task_id, Party::PartyB, ApprovalOutcome::Rejected, None)
        .expect("party B rejects");
    assert!(rejected.reverted);
    assert_eq!(rejected.task_status, TaskStatus::PendingReview);

    // The next proposal cycle still sees the earlier feedback.
    machine
        .propose_final_choice(&root, &task_id, &["SL-003".to_string()])
        .expect("re-propose");
    let feedback = store.list_task_feedback(&root, &task_id).expect("feedback list");
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].content, "parking concerns");
}

#[test]
fn feedback_alone_never_moves_the_status() {
    let mut store = SqliteStore::open(temp_dir("feedback_static")).expect("open store");
    let (root, task_id) = seed_joint_task(&mut store);

    {
        let notifier = NoopNotifier;
        let mut machine = StateMachine::new(&mut store, &notifier);
        machine
            .advance_task(&root, &task_id, TaskStatus::PendingReview)
            .expect("submit options");
    }
    for i in 0..3 {
        store
            .add_task_feedback(
                &root,
                FeedbackAddRequest {
                    task_id: task_id.clone(),
                    author: "ana@example.com".to_string(),
                    kind: "comment".to_string(),
                    content: format!("thought {i}"),
                },
            )
            .expect("feedback");
    }
    let task = store.get_task(&root, &task_id).expect("get").expect("task");
    assert_eq!(task.status, TaskStatus::PendingReview);
}

#[test]
fn approvals_are_rejected_where_no_policy_requires_them() {
    let mut store = SqliteStore::open(temp_dir("no_policy")).expect("open store");
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
                title: "Pick outfit".to_string(),
                description: None,
                status: TaskStatus::NotStarted,
                owning_party: Party::PartyA,
                approval_policy: ApprovalPolicy::NoApproval,
                category: None,
                due_date_ms: None,
                due_offset_days: None,
                subject_ids_json: None,
            },
        )
        .expect("create task");

    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);
    let err = machine
        .record_approval(&root, &task.id, Party::PartyA, ApprovalOutcome::Approved, None)
        .expect_err("no-approval task");
    match err {
        EngineError::Validation(ValidationKind::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {other:?}"),
    }

    // A single-owner task may instead jump straight to done.
    let advanced = machine
        .advance_task(&root, &task.id, TaskStatus::Completed)
        .expect("direct completion");
    assert_eq!(advanced.status, TaskStatus::Completed);
}

#[test]
fn uninvolved_party_cannot_sign_off_single_party_tasks() {
    let mut store = SqliteStore::open(temp_dir("wrong_party")).expect("open store");
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
                title: "Draft guest list".to_string(),
                description: None,
                status: TaskStatus::NotStarted,
                owning_party: Party::PartyB,
                approval_policy: ApprovalPolicy::SingleParty,
                category: None,
                due_date_ms: None,
                due_offset_days: None,
                subject_ids_json: None,
            },
        )
        .expect("create task");

    let notifier = NoopNotifier;
    let mut machine = StateMachine::new(&mut store, &notifier);
    let err = machine
        .record_approval(&root, &task.id, Party::PartyA, ApprovalOutcome::Approved, None)
        .expect_err("wrong side");
    match err {
        EngineError::Validation(ValidationKind::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}
