#![forbid(unsafe_code)]

//! The per-turn pipeline. Each turn is an independent unit of work: all
//! continuity is read back from the store, and nothing engine-side survives
//! between calls. A turn checks membership, records the message, classifies
//! it, assembles the bounded payload, compacts the window when due, asks the
//! reasoning capability for an action, dispatches at most one worker, and
//! synthesizes the reply.

use crate::capabilities::{
    ActionDecision, Embedder, EmptyCatalog, EmptyKnowledge, HashEmbedder, KeywordReasoner,
    KnowledgeSource, NoopNotifier, NotificationSender, ReasoningCapability, VendorCatalog,
};
use crate::context::{AssemblerCaps, assemble_context, maybe_compact};
use crate::error::{EngineError, ValidationKind};
use crate::intake::{IntakeFirstParty, IntakeOutcome, intake_first_party, intake_second_party};
use crate::machine::StateMachine;
use crate::router::{RetryPolicy, WorkerCtx, WorkerFailure, WorkerOutcome, WorkerRegistry, dispatch};
use crate::support::TurnLog;
use pl_core::ids::RootId;
use pl_storage::{RootRow, SqliteStore};
use serde_json::{Value, json};
use std::path::Path;

#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub root: String,
    pub identity: String,
    pub message: String,
}

/// The defined outcome of a turn. Every path ends here, failures included;
/// no turn goes unanswered.
#[derive(Clone, Debug)]
pub struct Reply {
    pub ok: bool,
    pub scope: String,
    pub text: String,
    pub data: Value,
    pub warnings: Vec<String>,
}

impl Reply {
    pub fn into_value(self) -> Value {
        json!({
            "ok": self.ok,
            "scope": self.scope,
            "text": self.text,
            "data": self.data,
            "warnings": self.warnings,
        })
    }

    fn failure(scope: &str, text: String) -> Self {
        Self {
            ok: false,
            scope: scope.to_string(),
            text,
            data: json!({}),
            warnings: Vec::new(),
        }
    }
}

pub struct Engine {
    store: SqliteStore,
    reasoning: Box<dyn ReasoningCapability>,
    notifier: Box<dyn NotificationSender>,
    catalog: Box<dyn VendorCatalog>,
    knowledge: Box<dyn KnowledgeSource>,
    embedder: Box<dyn Embedder>,
    caps: AssemblerCaps,
    retry: RetryPolicy,
    turn_log: TurnLog,
}

impl Engine {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let store = SqliteStore::open(storage_dir.as_ref())
            .map_err(|err| EngineError::from_store(err, "the store"))?;
        let turn_log = TurnLog::new(store.storage_dir());
        Ok(Self {
            store,
            reasoning: Box::new(KeywordReasoner),
            notifier: Box::new(NoopNotifier),
            catalog: Box::new(EmptyCatalog),
            knowledge: Box::new(EmptyKnowledge),
            embedder: Box::new(HashEmbedder),
            caps: AssemblerCaps::default(),
            retry: RetryPolicy::default(),
            turn_log,
        })
    }

    pub fn with_reasoning(mut self, reasoning: Box<dyn ReasoningCapability>) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn NotificationSender>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_catalog(mut self, catalog: Box<dyn VendorCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_knowledge(mut self, knowledge: Box<dyn KnowledgeSource>) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_caps(mut self, caps: AssemblerCaps) -> Self {
        self.caps = caps;
        self
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    /// Borrow the state machine over this engine's store and notifier.
    pub fn machine(&mut self) -> StateMachine<'_> {
        StateMachine::new(&mut self.store, self.notifier.as_ref())
    }

    pub fn intake_first_party(&mut self, request: IntakeFirstParty) -> Result<RootRow, EngineError> {
        intake_first_party(&mut self.store, request)
    }

    pub fn intake_second_party(
        &mut self,
        root: &RootId,
        identity: &str,
        details: &Value,
    ) -> Result<IntakeOutcome, EngineError> {
        intake_second_party(&mut self.store, self.notifier.as_ref(), root, identity, details)
    }

    pub fn handle_turn(&mut self, request: &TurnRequest) -> Reply {
        match self.turn_inner(request) {
            Ok(reply) => reply,
            Err(err) => {
                self.turn_log.note_error(&err.to_string());
                Reply::failure("minimal", err.user_message())
            }
        }
    }

    fn turn_inner(&mut self, request: &TurnRequest) -> Result<Reply, EngineError> {
        let root = RootId::try_new(request.root.clone())
            .map_err(|_| EngineError::Validation(ValidationKind::BadRootId))?;
        let role = self
            .store
            .member_role(&root, &request.identity)
            .map_err(|err| EngineError::from_store(err, "the member"))?
            .ok_or_else(|| {
                EngineError::Validation(ValidationKind::NotAMember {
                    identity: request.identity.clone(),
                })
            })?;

        self.store
            .append_turn(&root, &request.identity, &request.message)
            .map_err(|err| EngineError::from_store(err, "conversation"))?;

        // Classification is infallible by contract; the trait returns the
        // safe minimal tag instead of erroring.
        let scope = self.reasoning.classify_intent(&request.message);

        let payload = assemble_context(
            &self.store,
            self.embedder.as_ref(),
            &self.caps,
            &root,
            &request.identity,
            role,
            &request.message,
            scope,
        )?;
        maybe_compact(
            &mut self.store,
            self.reasoning.as_ref(),
            self.embedder.as_ref(),
            &self.caps,
            &root,
        )?;

        let decision = self
            .reasoning
            .decide_action(&payload, WorkerRegistry::global());

        let mut warnings: Vec<String> = payload
            .get("truncated")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|n| format!("{n} list was truncated"))
                    .collect()
            })
            .unwrap_or_default();

        let reply = match &decision {
            None => status_reply(scope.as_str(), &payload, warnings),
            Some(decision) => {
                let mut ctx = WorkerCtx {
                    store: &mut self.store,
                    root: &root,
                    identity: &request.identity,
                    catalog: self.catalog.as_ref(),
                    knowledge: self.knowledge.as_ref(),
                };
                let (outcome, mut dispatch_warnings) = dispatch(&mut ctx, decision, &self.retry);
                warnings.append(&mut dispatch_warnings);
                synthesize(scope.as_str(), decision, outcome, warnings)
            }
        };

        self.store
            .append_turn(&root, "assistant", &reply.text)
            .map_err(|err| EngineError::from_store(err, "conversation"))?;
        self.turn_log.note_turn(
            root.as_str(),
            scope.as_str(),
            decision.as_ref().map(|d| d.worker.as_str()),
        );
        Ok(reply)
    }
}

/// No worker was needed: answer from the assembled view itself.
fn status_reply(scope: &str, payload: &Value, warnings: Vec<String>) -> Reply {
    let collab = &payload["collab_status"];
    let open = |party: &str| collab[party]["open"].as_i64().unwrap_or(0);
    let workflows = payload["workflows"].as_array().map(Vec::len).unwrap_or(0);
    let text = format!(
        "Here's where things stand: {} open item(s) for one side, {} for the other, {} shared; {} process(es) in flight.",
        open("party_a"),
        open("party_b"),
        open("joint"),
        workflows
    );
    Reply {
        ok: true,
        scope: scope.to_string(),
        text,
        data: json!({
            "collab_status": collab.clone(),
            "workflows": payload["workflows"].clone(),
            "rolling_summary": payload["rolling_summary"].clone(),
        }),
        warnings,
    }
}

fn synthesize(
    scope: &str,
    decision: &ActionDecision,
    outcome: WorkerOutcome,
    warnings: Vec<String>,
) -> Reply {
    match outcome {
        WorkerOutcome::Success { summary, data } => Reply {
            ok: true,
            scope: scope.to_string(),
            text: summary,
            data,
            warnings,
        },
        WorkerOutcome::Failure { kind, message } => match kind {
            // Domain outcomes are answers, not faults.
            WorkerFailure::Domain => Reply {
                ok: true,
                scope: scope.to_string(),
                text: message,
                data: json!({ "worker": decision.worker.as_str(), "outcome": "empty" }),
                warnings,
            },
            WorkerFailure::Validation => Reply {
                ok: false,
                scope: scope.to_string(),
                text: format!("I couldn't do that: {message}."),
                data: json!({ "worker": decision.worker.as_str() }),
                warnings,
            },
            WorkerFailure::Transient => Reply {
                ok: false,
                scope: scope.to_string(),
                text: "That didn't go through; please try again in a moment.".to_string(),
                data: json!({ "worker": decision.worker.as_str() }),
                warnings,
            },
        },
    }
}
