#![forbid(unsafe_code)]

mod conversation;
mod domain;
mod error;
mod events;
mod facts;
mod requests;
mod roots;
mod tasks;
mod types;
mod workflows;

pub use error::StoreError;
pub use requests::*;
pub use types::*;

use pl_core::ids::RootId;
use pl_core::model::{ApprovalOutcome, ApprovalPolicy, Party, Role, RootStatus, TaskStatus, WorkflowStatus};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "planloom.db";
const GLOBAL_SCOPE: &str = "";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          scope TEXT NOT NULL,
          name TEXT NOT NULL,
          value INTEGER NOT NULL,
          PRIMARY KEY (scope, name)
        );

        CREATE TABLE IF NOT EXISTS roots (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          display_name TEXT NOT NULL,
          target_date_ms INTEGER,
          status TEXT NOT NULL,
          details_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS members (
          root TEXT NOT NULL,
          identity TEXT NOT NULL,
          role TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, identity)
        );

        CREATE TABLE IF NOT EXISTS workflows (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          revision INTEGER NOT NULL,
          name TEXT NOT NULL,
          status TEXT NOT NULL,
          context_summary_json TEXT,
          related_ids_json TEXT NOT NULL,
          failure_reason TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );
        CREATE INDEX IF NOT EXISTS idx_workflows_root_status ON workflows(root, status);

        CREATE TABLE IF NOT EXISTS tasks (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          revision INTEGER NOT NULL,
          workflow_id TEXT,
          title TEXT NOT NULL,
          description TEXT,
          status TEXT NOT NULL,
          owning_party TEXT NOT NULL,
          approval_policy TEXT NOT NULL,
          category TEXT,
          due_date_ms INTEGER,
          due_offset_days INTEGER,
          subject_ids_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_root_status ON tasks(root, status);

        CREATE TABLE IF NOT EXISTS task_feedback (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          task_id TEXT NOT NULL,
          author TEXT NOT NULL,
          kind TEXT NOT NULL,
          content TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );
        CREATE INDEX IF NOT EXISTS idx_feedback_root_task ON task_feedback(root, task_id);

        CREATE TABLE IF NOT EXISTS task_approvals (
          root TEXT NOT NULL,
          task_id TEXT NOT NULL,
          party TEXT NOT NULL,
          status TEXT NOT NULL,
          approver TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, task_id, party)
        );

        CREATE TABLE IF NOT EXISTS conversation_state (
          root TEXT PRIMARY KEY,
          rolling_summary TEXT NOT NULL,
          turn_count INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversation_turns (
          root TEXT NOT NULL,
          seq INTEGER NOT NULL,
          speaker TEXT NOT NULL,
          content TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, seq)
        );

        CREATE TABLE IF NOT EXISTS semantic_facts (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          content TEXT NOT NULL,
          embedding_json TEXT NOT NULL,
          metadata_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );

        CREATE TABLE IF NOT EXISTS events (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          root TEXT NOT NULL,
          ts_ms INTEGER NOT NULL,
          entity_id TEXT,
          type TEXT NOT NULL,
          payload_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_root_seq ON events(root, seq);

        CREATE TABLE IF NOT EXISTS shortlist (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          vendor_name TEXT NOT NULL,
          category TEXT NOT NULL,
          status TEXT NOT NULL,
          estimated_cost_cents INTEGER,
          notes TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );

        CREATE TABLE IF NOT EXISTS bookings (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          shortlist_id TEXT,
          vendor_name TEXT NOT NULL,
          event_date_ms INTEGER NOT NULL,
          status TEXT NOT NULL,
          total_amount_cents INTEGER,
          paid_amount_cents INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );

        CREATE TABLE IF NOT EXISTS budget_items (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          item_name TEXT NOT NULL,
          category TEXT NOT NULL,
          amount_cents INTEGER NOT NULL,
          vendor_name TEXT,
          status TEXT NOT NULL,
          contribution_by TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id),
          UNIQUE (root, item_name, category)
        );

        CREATE TABLE IF NOT EXISTS guests (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          name TEXT NOT NULL,
          contact TEXT,
          side TEXT,
          status TEXT NOT NULL,
          dietary TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );

        CREATE TABLE IF NOT EXISTS timeline_events (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          name TEXT NOT NULL,
          at_ms INTEGER NOT NULL,
          location TEXT,
          description TEXT,
          relevant_party TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );

        CREATE TABLE IF NOT EXISTS board_items (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          note TEXT,
          category TEXT NOT NULL,
          image_ref TEXT,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );

        CREATE TABLE IF NOT EXISTS ritual_notes (
          root TEXT NOT NULL,
          id TEXT NOT NULL,
          tradition TEXT NOT NULL,
          topic TEXT NOT NULL,
          content TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (root, id)
        );
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", "v1"],
    )?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}

pub(crate) fn next_counter_tx(
    tx: &Transaction<'_>,
    scope: &str,
    name: &str,
) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE scope=?1 AND name=?2",
            params![scope, name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        r#"
        INSERT INTO counters(scope, name, value) VALUES (?1, ?2, ?3)
        ON CONFLICT(scope, name) DO UPDATE SET value=excluded.value
        "#,
        params![scope, name, next],
    )?;
    Ok(next)
}

pub(crate) fn next_global_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    next_counter_tx(tx, GLOBAL_SCOPE, name)
}

pub(crate) fn require_root_tx(tx: &Transaction<'_>, root: &RootId) -> Result<(), StoreError> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM roots WHERE id = ?1",
            params![root.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists { Ok(()) } else { Err(StoreError::UnknownRoot) }
}

pub(crate) fn insert_event_tx(
    tx: &Transaction<'_>,
    root: &str,
    ts_ms: i64,
    entity_id: Option<&str>,
    event_type: &str,
    payload_json: &str,
) -> Result<EventRow, StoreError> {
    tx.execute(
        r#"
        INSERT INTO events(root, ts_ms, entity_id, type, payload_json)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![root, ts_ms, entity_id, event_type, payload_json],
    )?;
    let seq = tx.last_insert_rowid();
    Ok(EventRow {
        seq,
        ts_ms,
        entity_id: entity_id.map(str::to_string),
        event_type: event_type.to_string(),
        payload_json: payload_json.to_string(),
    })
}

pub(crate) fn check_revision(expected: Option<i64>, actual: i64) -> Result<(), StoreError> {
    if let Some(expected) = expected
        && expected != actual
    {
        return Err(StoreError::RevisionMismatch { expected, actual });
    }
    Ok(())
}

pub(crate) fn parse_root_status(value: &str) -> Result<RootStatus, StoreError> {
    RootStatus::parse(value).ok_or(StoreError::Corrupt("roots.status"))
}

pub(crate) fn parse_workflow_status(value: &str) -> Result<WorkflowStatus, StoreError> {
    WorkflowStatus::parse(value).ok_or(StoreError::Corrupt("workflows.status"))
}

pub(crate) fn parse_task_status(value: &str) -> Result<TaskStatus, StoreError> {
    TaskStatus::parse(value).ok_or(StoreError::Corrupt("tasks.status"))
}

pub(crate) fn parse_party(value: &str) -> Result<Party, StoreError> {
    Party::parse(value).ok_or(StoreError::Corrupt("party"))
}

pub(crate) fn parse_role(value: &str) -> Result<Role, StoreError> {
    Role::parse(value).ok_or(StoreError::Corrupt("members.role"))
}

pub(crate) fn parse_policy(value: &str) -> Result<ApprovalPolicy, StoreError> {
    ApprovalPolicy::parse(value).ok_or(StoreError::Corrupt("tasks.approval_policy"))
}

pub(crate) fn parse_approval_outcome(value: &str) -> Result<ApprovalOutcome, StoreError> {
    ApprovalOutcome::parse(value).ok_or(StoreError::Corrupt("task_approvals.status"))
}
