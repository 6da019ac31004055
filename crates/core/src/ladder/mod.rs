#![forbid(unsafe_code)]

//! Legal-transition rules for the Workflow lifecycle and the Task review
//! ladder. Pure functions over status values; the storage layer supplies the
//! current state and the engine supplies the target.

use crate::model::{ApprovalPolicy, TaskStatus, WorkflowStatus};


#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionError {
    InvalidWorkflowTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
    IllegalTaskTransition {
        from: TaskStatus,
        to: TaskStatus,
    },
    /// Completion was requested directly on a task whose policy requires the
    /// review/approval steps; completion must come from recorded approvals.
    ApprovalRequired {
        from: TaskStatus,
    },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWorkflowTransition { from, to } => write!(
                f,
                "invalid workflow transition ({} -> {})",
                from.as_str(),
                to.as_str()
            ),
            Self::IllegalTaskTransition { from, to } => write!(
                f,
                "illegal task transition ({} -> {})",
                from.as_str(),
                to.as_str()
            ),
            Self::ApprovalRequired { from } => write!(
                f,
                "task at {} requires recorded approvals to complete",
                from.as_str()
            ),
        }
    }
}

impl std::error::Error for TransitionError {}

/// Validate a workflow status change. Same-state moves on non-terminal
/// statuses are accepted so callers can refresh the context summary without
/// special-casing; terminal states accept only their own repetition (the
/// idempotence guarantee).
pub fn workflow_transition(
    from: WorkflowStatus,
    to: WorkflowStatus,
) -> Result<(), TransitionError> {
    use WorkflowStatus::*;

    if from == to {
        return Ok(());
    }
    let ok = match from {
        NotStarted => matches!(to, InProgress | Failed),
        InProgress => matches!(to, Paused | AwaitingFeedback | Completed | Failed),
        AwaitingFeedback => matches!(to, Paused | InProgress | Completed | Failed),
        Paused => matches!(to, InProgress | Completed | Failed),
        Completed | Failed => false,
    };
    if ok {
        Ok(())
    } else {
        Err(TransitionError::InvalidWorkflowTransition { from, to })
    }
}

/// Validate a task status change against the review ladder.
///
/// Forward moves climb one rung at a time when the policy requires review;
/// a `NoApproval` task may jump forward freely. Rejection reverts exactly one
/// rung. `Blocked` is reachable from any non-terminal state and unblocks to
/// any non-completed rung.
pub fn task_transition(
    from: TaskStatus,
    to: TaskStatus,
    policy: ApprovalPolicy,
) -> Result<(), TransitionError> {
    use TaskStatus::*;

    if from == to {
        return if from == Completed {
            Ok(())
        } else {
            Err(TransitionError::IllegalTaskTransition { from, to })
        };
    }

    if from == Completed {
        return Err(TransitionError::IllegalTaskTransition { from, to });
    }

    if to == Blocked {
        return Ok(());
    }

    if from == Blocked {
        return if to == Completed {
            Err(TransitionError::IllegalTaskTransition { from, to })
        } else {
            Ok(())
        };
    }

    let (Some(from_rung), Some(to_rung)) = (from.rung(), to.rung()) else {
        return Err(TransitionError::IllegalTaskTransition { from, to });
    };

    if to_rung > from_rung {
        if to == Completed && policy.requires_review() {
            // Only the approval aggregate may complete a reviewed task.
            return Err(TransitionError::ApprovalRequired { from });
        }
        if policy.requires_review() && to_rung != from_rung + 1 {
            return Err(TransitionError::IllegalTaskTransition { from, to });
        }
        return Ok(());
    }

    // Backward moves model rejection: one rung at a time, never from a
    // terminal state.
    if to_rung + 1 == from_rung {
        return Ok(());
    }
    Err(TransitionError::IllegalTaskTransition { from, to })
}
