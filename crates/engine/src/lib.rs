#![forbid(unsafe_code)]

mod capabilities;
mod context;
mod error;
mod intake;
mod machine;
mod provisioning;
mod router;
mod support;
mod turn;
mod workers;

pub use capabilities::{
    ActionDecision, CatalogVendor, Embedder, EmptyCatalog, EmptyKnowledge, HashEmbedder,
    KeywordReasoner, KnowledgeSource, NoopNotifier, NotificationSender, NotifyOutcome,
    ReasoningCapability, StaticCatalog, VendorCatalog,
};
pub use context::{AssemblerCaps, ScopeTag, assemble_context};
pub use error::{EngineError, ValidationKind};
pub use intake::{IntakeFirstParty, IntakeOutcome, intake_first_party, intake_second_party};
pub use machine::{ContextSummary, StateMachine};
pub use provisioning::{ProvisionReport, provision};
pub use router::{
    RetryPolicy, Table, WorkerCtx, WorkerFailure, WorkerName, WorkerOutcome, WorkerRegistry,
    WorkerSpec, check_single_writer, dispatch,
};
pub use turn::{Engine, Reply, TurnRequest};
