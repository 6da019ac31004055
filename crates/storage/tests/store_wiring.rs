#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_core::model::{ApprovalPolicy, Party, Role, RootStatus, TaskStatus, WorkflowStatus};
use pl_storage::{
    CreateRootRequest, CreateWorkflowRequest, SetTaskStatusRequest, SetWorkflowStateRequest,
    SqliteStore, StoreError, TaskCreateRequest, TaskListRequest,
};
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

fn open_store(test_name: &str) -> SqliteStore {
    SqliteStore::open(temp_dir(test_name)).expect("open store")
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

fn task_request(title: &str, owner: Party, policy: ApprovalPolicy) -> TaskCreateRequest {
    TaskCreateRequest {
        workflow_id: None,
        title: title.to_string(),
        description: None,
        status: TaskStatus::NotStarted,
        owning_party: owner,
        approval_policy: policy,
        category: None,
        due_date_ms: None,
        due_offset_days: None,
        subject_ids_json: None,
    }
}

#[test]
fn root_starts_in_onboarding_and_members_are_unique() {
    let mut store = open_store("root_members");
    let root = seed_root(&mut store);

    let row = store.get_root(&root).expect("get root").expect("root exists");
    assert_eq!(row.status, RootStatus::Onboarding);
    assert_eq!(row.revision, 0);

    store
        .add_member(&root, "ana@example.com", Role::PrimaryA)
        .expect("add first member");
    let err = store
        .add_member(&root, "ana@example.com", Role::Delegate)
        .expect_err("duplicate identity must fail");
    match err {
        StoreError::MemberExists => {}
        other => panic!("expected MemberExists, got {other:?}"),
    }

    let members = store.list_members(&root).expect("list members");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, Role::PrimaryA);
    assert_eq!(
        store
            .member_role(&root, "ana@example.com")
            .expect("member role"),
        Some(Role::PrimaryA)
    );
    assert_eq!(store.member_role(&root, "nobody").expect("member role"), None);
}

#[test]
fn duplicate_active_workflow_is_rejected() {
    let mut store = open_store("duplicate_workflow");
    let root = seed_root(&mut store);

    let first = store
        .create_workflow(
            &root,
            CreateWorkflowRequest {
                name: "venue_booking".to_string(),
                context_summary_json: None,
                related_ids_json: None,
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("create workflow");
    assert_eq!(first.status, WorkflowStatus::NotStarted);

    // not_started is outside the active set, so a second instance is fine...
    let second = store
        .create_workflow(
            &root,
            CreateWorkflowRequest {
                name: "venue_booking".to_string(),
                context_summary_json: None,
                related_ids_json: None,
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("second not_started instance");

    // ...but once one is in progress, creation fails.
    store
        .set_workflow_state(
            &root,
            SetWorkflowStateRequest {
                id: second.id.clone(),
                expected_revision: Some(0),
                status: WorkflowStatus::InProgress,
                context_summary_json: None,
                related_ids_json: None,
                failure_reason: None,
                event_type: "workflow.status".to_string(),
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("advance to in_progress");

    let err = store
        .create_workflow(
            &root,
            CreateWorkflowRequest {
                name: "venue_booking".to_string(),
                context_summary_json: None,
                related_ids_json: None,
                event_payload_json: "{}".to_string(),
            },
        )
        .expect_err("active duplicate must fail");
    match err {
        StoreError::DuplicateActiveWorkflow { name } => assert_eq!(name, "venue_booking"),
        other => panic!("expected DuplicateActiveWorkflow, got {other:?}"),
    }
}

#[test]
fn workflow_revision_mismatch_is_reported() {
    let mut store = open_store("workflow_revision");
    let root = seed_root(&mut store);
    let wf = store
        .create_workflow(
            &root,
            CreateWorkflowRequest {
                name: "venue_booking".to_string(),
                context_summary_json: None,
                related_ids_json: None,
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("create workflow");

    store
        .set_workflow_state(
            &root,
            SetWorkflowStateRequest {
                id: wf.id.clone(),
                expected_revision: Some(0),
                status: WorkflowStatus::InProgress,
                context_summary_json: None,
                related_ids_json: None,
                failure_reason: None,
                event_type: "workflow.status".to_string(),
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("first writer wins");

    let err = store
        .set_workflow_state(
            &root,
            SetWorkflowStateRequest {
                id: wf.id.clone(),
                expected_revision: Some(0),
                status: WorkflowStatus::Paused,
                context_summary_json: None,
                related_ids_json: None,
                failure_reason: None,
                event_type: "workflow.status".to_string(),
                event_payload_json: "{}".to_string(),
            },
        )
        .expect_err("stale writer must lose");
    match err {
        StoreError::RevisionMismatch { expected, actual } => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected RevisionMismatch, got {other:?}"),
    }
}

#[test]
fn pause_overwrites_summary_and_resume_returns_it_verbatim() {
    let mut store = open_store("pause_resume_summary");
    let root = seed_root(&mut store);
    let wf = store
        .create_workflow(
            &root,
            CreateWorkflowRequest {
                name: "venue_booking".to_string(),
                context_summary_json: Some("{\"stale\":true}".to_string()),
                related_ids_json: None,
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("create workflow");

    let summary = "{\"shortlist\":[\"V1\",\"V2\",\"V3\"]}";
    store
        .set_workflow_state(
            &root,
            SetWorkflowStateRequest {
                id: wf.id.clone(),
                expected_revision: Some(0),
                status: WorkflowStatus::Paused,
                context_summary_json: Some(summary.to_string()),
                related_ids_json: Some("[\"TASK-001\"]".to_string()),
                failure_reason: None,
                event_type: "workflow.paused".to_string(),
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("pause with fresh summary");

    let stored = store
        .get_workflow(&root, &wf.id)
        .expect("get workflow")
        .expect("workflow exists");
    assert_eq!(stored.status, WorkflowStatus::Paused);
    assert_eq!(stored.context_summary_json.as_deref(), Some(summary));
    assert_eq!(stored.related_ids_json, "[\"TASK-001\"]");
}

#[test]
fn task_listing_filters_by_status_and_party() {
    let mut store = open_store("task_listing");
    let root = seed_root(&mut store);

    store
        .create_task(&root, task_request("Book venue", Party::Joint, ApprovalPolicy::DualParty))
        .expect("task 1");
    store
        .create_task(&root, task_request("Pick outfit", Party::PartyA, ApprovalPolicy::NoApproval))
        .expect("task 2");

    let joint = store
        .list_tasks(
            &root,
            TaskListRequest {
                owning_party: Some(Party::Joint),
                ..TaskListRequest::default()
            },
        )
        .expect("list joint tasks");
    assert_eq!(joint.len(), 1);
    assert_eq!(joint[0].title, "Book venue");

    let not_started = store
        .list_tasks(
            &root,
            TaskListRequest {
                status: Some(TaskStatus::NotStarted),
                ..TaskListRequest::default()
            },
        )
        .expect("list not_started tasks");
    assert_eq!(not_started.len(), 2);
}

#[test]
fn task_status_update_emits_event_and_checks_revision() {
    let mut store = open_store("task_status");
    let root = seed_root(&mut store);
    let task = store
        .create_task(&root, task_request("Book venue", Party::Joint, ApprovalPolicy::DualParty))
        .expect("create task");

    let (revision, event) = store
        .set_task_status(
            &root,
            SetTaskStatusRequest {
                id: task.id.clone(),
                expected_revision: Some(0),
                status: TaskStatus::PendingReview,
                subject_ids_json: None,
                event_type: "task.status".to_string(),
                event_payload_json: "{\"to\":\"pending_review\"}".to_string(),
            },
        )
        .expect("advance task");
    assert_eq!(revision, 1);
    assert!(event.event_id().starts_with("evt_"));

    let err = store
        .set_task_status(
            &root,
            SetTaskStatusRequest {
                id: task.id.clone(),
                expected_revision: Some(0),
                status: TaskStatus::PendingFinalApproval,
                subject_ids_json: None,
                event_type: "task.status".to_string(),
                event_payload_json: "{}".to_string(),
            },
        )
        .expect_err("stale revision must fail");
    match err {
        StoreError::RevisionMismatch { .. } => {}
        other => panic!("expected RevisionMismatch, got {other:?}"),
    }

    let events = store.list_events(&root, None, 50).expect("list events");
    assert!(events.iter().any(|e| e.event_type == "task.status"));
}
