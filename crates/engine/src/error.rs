#![forbid(unsafe_code)]

use pl_core::ladder::TransitionError;
use pl_storage::StoreError;

/// Engine-level failure taxonomy. Validation failures are caller mistakes and
/// are never retried; concurrency failures are retried once with a fresh
/// read; transient failures are retried with backoff and then surfaced as a
/// "try again later" outcome. Domain outcomes ("no matching vendors") are
/// data, not errors, and never appear here.
#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationKind),
    Concurrency { entity: String },
    Transient { message: String },
}

#[derive(Debug)]
pub enum ValidationKind {
    NotAMember { identity: String },
    UnknownEntity { entity: String },
    DuplicateActiveWorkflow { name: String },
    MemberExists,
    Transition(TransitionError),
    IntakeMismatch { expected: Option<String> },
    MissingTargetDate,
    InvalidInput(&'static str),
    BadRootId,
}

impl EngineError {
    pub(crate) fn from_store(err: StoreError, entity: &str) -> Self {
        match err {
            StoreError::RevisionMismatch { .. } => EngineError::Concurrency {
                entity: entity.to_string(),
            },
            StoreError::UnknownId | StoreError::UnknownRoot => {
                EngineError::Validation(ValidationKind::UnknownEntity {
                    entity: entity.to_string(),
                })
            }
            StoreError::DuplicateActiveWorkflow { name } => {
                EngineError::Validation(ValidationKind::DuplicateActiveWorkflow { name })
            }
            StoreError::MemberExists => EngineError::Validation(ValidationKind::MemberExists),
            StoreError::InvalidInput(message) => {
                EngineError::Validation(ValidationKind::InvalidInput(message))
            }
            StoreError::Io(err) => EngineError::Transient {
                message: format!("storage io: {err}"),
            },
            StoreError::Sql(err) => EngineError::Transient {
                message: format!("storage: {err}"),
            },
            StoreError::Corrupt(column) => EngineError::Transient {
                message: format!("storage record unreadable: {column}"),
            },
        }
    }

    pub fn is_concurrency(&self) -> bool {
        matches!(self, EngineError::Concurrency { .. })
    }

    /// A defined, non-technical reply for the collaborator. Every failure
    /// path ends in one of these; no turn goes unanswered.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Validation(kind) => match kind {
                ValidationKind::NotAMember { .. } => {
                    "You are not registered as a collaborator on this plan.".to_string()
                }
                ValidationKind::UnknownEntity { entity } => {
                    format!("I couldn't find {entity} on this plan.")
                }
                ValidationKind::DuplicateActiveWorkflow { name } => format!(
                    "There is already an active \"{name}\" process; I won't start a second one."
                ),
                ValidationKind::MemberExists => {
                    "That collaborator is already part of this plan.".to_string()
                }
                ValidationKind::Transition(err) => match err {
                    TransitionError::ApprovalRequired { .. } => {
                        "That item needs sign-off from the required sides before it can be marked done."
                            .to_string()
                    }
                    _ => "That change would skip a required step, so I left things as they were."
                        .to_string(),
                },
                ValidationKind::IntakeMismatch { expected } => match expected {
                    Some(expected) => format!(
                        "This plan is waiting for {expected} to join; that invitation can't be used by someone else."
                    ),
                    None => "This plan isn't waiting for another partner to join.".to_string(),
                },
                ValidationKind::MissingTargetDate => {
                    "Deadlines can't be recomputed until a target date is set.".to_string()
                }
                ValidationKind::InvalidInput(message) => {
                    format!("That request couldn't be applied: {message}.")
                }
                ValidationKind::BadRootId => "That plan reference doesn't look right.".to_string(),
            },
            EngineError::Concurrency { entity } => format!(
                "Someone else just updated {entity}; I re-checked and the change no longer applies."
            ),
            EngineError::Transient { .. } => {
                "Something went wrong on my side; please try again in a moment.".to_string()
            }
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(kind) => write!(f, "validation: {kind:?}"),
            EngineError::Concurrency { entity } => write!(f, "concurrent modification: {entity}"),
            EngineError::Transient { message } => write!(f, "transient: {message}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<TransitionError> for EngineError {
    fn from(value: TransitionError) -> Self {
        EngineError::Validation(ValidationKind::Transition(value))
    }
}
