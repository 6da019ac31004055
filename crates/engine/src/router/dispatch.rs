#![forbid(unsafe_code)]

use super::registry::{WorkerRegistry, WorkerSpec};
use crate::capabilities::{ActionDecision, KnowledgeSource, VendorCatalog};
use pl_core::ids::RootId;
use pl_storage::{SqliteStore, StoreError};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Everything a worker may touch during one invocation. The store reference
/// is the only write path; catalog and knowledge are read-only externals.
pub struct WorkerCtx<'a> {
    pub store: &'a mut SqliteStore,
    pub root: &'a RootId,
    pub identity: &'a str,
    pub catalog: &'a dyn VendorCatalog,
    pub knowledge: &'a dyn KnowledgeSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerFailure {
    /// Not a fault: the domain had nothing to offer (e.g. no matching
    /// vendors). Passed through to reply synthesis as data.
    Domain,
    /// Caller or argument mistake. Never retried.
    Validation,
    /// Worth one more try after a short backoff.
    Transient,
}

#[derive(Clone, Debug)]
pub enum WorkerOutcome {
    Success { summary: String, data: Value },
    Failure { kind: WorkerFailure, message: String },
}

impl WorkerOutcome {
    pub fn success(summary: impl Into<String>, data: Value) -> Self {
        WorkerOutcome::Success {
            summary: summary.into(),
            data,
        }
    }

    pub fn domain(message: impl Into<String>) -> Self {
        WorkerOutcome::Failure {
            kind: WorkerFailure::Domain,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WorkerOutcome::Failure {
            kind: WorkerFailure::Validation,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        WorkerOutcome::Failure {
            kind: WorkerFailure::Transient,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WorkerOutcome::Failure {
                kind: WorkerFailure::Transient,
                ..
            }
        )
    }
}

/// Map a store failure inside a worker to the outcome taxonomy.
pub(crate) fn store_failure(err: StoreError) -> WorkerOutcome {
    match err {
        StoreError::RevisionMismatch { .. } => {
            WorkerOutcome::validation("that record was just updated by someone else; please retry")
        }
        StoreError::UnknownId | StoreError::UnknownRoot => {
            WorkerOutcome::validation("referenced record was not found")
        }
        StoreError::MemberExists => WorkerOutcome::validation("already registered"),
        StoreError::DuplicateActiveWorkflow { name } => {
            WorkerOutcome::validation(format!("an active process named {name:?} already exists"))
        }
        StoreError::InvalidInput(message) => WorkerOutcome::validation(message),
        StoreError::Io(err) => WorkerOutcome::transient(format!("storage io: {err}")),
        StoreError::Sql(err) => WorkerOutcome::transient(format!("storage: {err}")),
        StoreError::Corrupt(column) => {
            WorkerOutcome::transient(format!("storage record unreadable: {column}"))
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts for transient failures (first call included).
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Invocations running past this are flagged; workers are expected to be
    /// single-transaction, so an overrun cannot leave partial writes behind.
    pub worker_budget_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 50,
            worker_budget_ms: 2_000,
        }
    }
}

/// Invoke the decided worker with its declared argument contract.
/// Validation and domain failures return immediately; transient failures are
/// retried with exponential backoff up to the attempt cap. Registered
/// handlers must be idempotent under retry.
pub fn dispatch(
    ctx: &mut WorkerCtx<'_>,
    decision: &ActionDecision,
    policy: &RetryPolicy,
) -> (WorkerOutcome, Vec<String>) {
    let mut warnings = Vec::new();

    let Some(spec) = WorkerRegistry::global().find(decision.worker) else {
        return (
            WorkerOutcome::validation(format!("unknown worker: {}", decision.worker.as_str())),
            warnings,
        );
    };
    if let Some(message) = check_args(spec, &decision.arguments) {
        return (WorkerOutcome::validation(message), warnings);
    }

    let mut attempt = 0u32;
    loop {
        let started = Instant::now();
        let outcome = (spec.handler)(ctx, &decision.arguments);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms > policy.worker_budget_ms {
            warnings.push(format!(
                "{} ran {elapsed_ms}ms, over its {}ms budget",
                spec.name.as_str(),
                policy.worker_budget_ms
            ));
        }

        attempt += 1;
        if outcome.is_transient() && attempt < policy.max_attempts {
            std::thread::sleep(Duration::from_millis(
                policy.base_delay_ms << (attempt - 1),
            ));
            continue;
        }
        return (outcome, warnings);
    }
}

fn check_args(spec: &WorkerSpec, args: &Value) -> Option<String> {
    let Some(obj) = args.as_object() else {
        return Some(format!(
            "{} arguments must be an object",
            spec.name.as_str()
        ));
    };
    for key in spec.required_args {
        if !obj.contains_key(*key) {
            return Some(format!("{} requires argument {key:?}", spec.name.as_str()));
        }
    }
    None
}
