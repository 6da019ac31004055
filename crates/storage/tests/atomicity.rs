#![forbid(unsafe_code)]

use pl_core::ids::RootId;
use pl_core::model::{ApprovalPolicy, Party, TaskStatus};
use pl_storage::{
    BookAndAdvanceRequest, CreateRootRequest, ShortlistAddRequest, SqliteStore, StoreError,
    TaskCreateRequest, TaskListRequest,
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

fn task(title: &str, owner: Party, policy: ApprovalPolicy) -> TaskCreateRequest {
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
fn bulk_task_create_rolls_back_on_invalid_entry() {
    let mut store = SqliteStore::open(temp_dir("bulk_rollback")).expect("open store");
    let root = seed_root(&mut store);

    let err = store
        .create_tasks_bulk(
            &root,
            vec![
                task("Book venue", Party::Joint, ApprovalPolicy::DualParty),
                // joint + single-party approval is a template error
                task("Broken", Party::Joint, ApprovalPolicy::SingleParty),
                task("Pick outfit", Party::PartyA, ApprovalPolicy::NoApproval),
            ],
        )
        .expect_err("invalid entry must fail the batch");
    match err {
        StoreError::InvalidInput(message) => {
            assert_eq!(
                message,
                "joint-owned tasks cannot use a single-party approval policy"
            );
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }

    let listed = store
        .list_tasks(&root, TaskListRequest::default())
        .expect("list tasks");
    assert!(
        listed.is_empty(),
        "expected atomic rollback, found {} tasks",
        listed.len()
    );
}

#[test]
fn book_and_advance_rolls_back_booking_on_stale_task_revision() {
    let mut store = SqliteStore::open(temp_dir("book_advance_rollback")).expect("open store");
    let root = seed_root(&mut store);

    let shortlisted = store
        .shortlist_add(
            &root,
            ShortlistAddRequest {
                vendor_name: "Grand Palace".to_string(),
                category: "venue".to_string(),
                estimated_cost_cents: Some(5_000_00),
                notes: None,
            },
        )
        .expect("shortlist vendor");
    let created = store
        .create_task(&root, task("Book venue", Party::PartyA, ApprovalPolicy::NoApproval))
        .expect("create task");

    let err = store
        .book_and_advance_task(
            &root,
            BookAndAdvanceRequest {
                shortlist_id: shortlisted.id.clone(),
                event_date_ms: 1_900_000_000_000,
                total_amount_cents: Some(5_000_00),
                task_id: created.id.clone(),
                expected_task_revision: Some(7),
                task_status: TaskStatus::Completed,
                event_payload_json: "{}".to_string(),
            },
        )
        .expect_err("stale task revision must abort the unit");
    match err {
        StoreError::RevisionMismatch { expected, actual } => {
            assert_eq!(expected, 7);
            assert_eq!(actual, 0);
        }
        other => panic!("expected RevisionMismatch, got {other:?}"),
    }

    assert!(
        store.bookings_list(&root, 10).expect("bookings").is_empty(),
        "booking must not survive an aborted unit"
    );
    let unchanged = store
        .get_task(&root, &created.id)
        .expect("get task")
        .expect("task");
    assert_eq!(unchanged.status, TaskStatus::NotStarted);
    let still_shortlisted = store.shortlist_list(&root, 10).expect("shortlist");
    assert_eq!(still_shortlisted[0].status, "shortlisted");
}

#[test]
fn book_and_advance_commits_both_sides_together() {
    let mut store = SqliteStore::open(temp_dir("book_advance_commit")).expect("open store");
    let root = seed_root(&mut store);

    let shortlisted = store
        .shortlist_add(
            &root,
            ShortlistAddRequest {
                vendor_name: "Grand Palace".to_string(),
                category: "venue".to_string(),
                estimated_cost_cents: None,
                notes: None,
            },
        )
        .expect("shortlist vendor");
    let created = store
        .create_task(&root, task("Book venue", Party::PartyA, ApprovalPolicy::NoApproval))
        .expect("create task");

    let (booking, new_revision) = store
        .book_and_advance_task(
            &root,
            BookAndAdvanceRequest {
                shortlist_id: shortlisted.id.clone(),
                event_date_ms: 1_900_000_000_000,
                total_amount_cents: Some(5_000_00),
                task_id: created.id.clone(),
                expected_task_revision: Some(0),
                task_status: TaskStatus::Completed,
                event_payload_json: "{}".to_string(),
            },
        )
        .expect("atomic unit");
    assert_eq!(new_revision, 1);
    assert_eq!(booking.vendor_name, "Grand Palace");

    let advanced = store
        .get_task(&root, &created.id)
        .expect("get task")
        .expect("task");
    assert_eq!(advanced.status, TaskStatus::Completed);
    assert_eq!(store.shortlist_list(&root, 10).expect("shortlist")[0].status, "booked");
}
