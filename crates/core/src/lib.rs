#![forbid(unsafe_code)]

pub mod ladder;

pub mod ids {
    /// Identifier of one collaboration root (the record grouping every
    /// long-lived entity for a single planning effort).
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct RootId(String);

    impl RootId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, RootIdError> {
            let value = value.into();
            validate_root_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum RootIdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl std::fmt::Display for RootIdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Empty => write!(f, "root id must not be empty"),
                Self::TooLong => write!(f, "root id must be at most 128 chars"),
                Self::InvalidFirstChar => {
                    write!(f, "root id must start with an ascii alphanumeric char")
                }
                Self::InvalidChar { ch, index } => {
                    write!(f, "root id has invalid char {ch:?} at index {index}")
                }
            }
        }
    }

    impl std::error::Error for RootIdError {}

    fn validate_root_id(value: &str) -> Result<(), RootIdError> {
        if value.is_empty() {
            return Err(RootIdError::Empty);
        }
        if value.len() > 128 {
            return Err(RootIdError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(RootIdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(RootIdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate() {
            if index == 0 {
                continue;
            }
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(RootIdError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    /// Lifecycle of a collaboration root. Roots are never deleted; a finished
    /// effort is archived.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum RootStatus {
        Onboarding,
        Active,
        Completed,
        Archived,
    }

    impl RootStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                RootStatus::Onboarding => "onboarding",
                RootStatus::Active => "active",
                RootStatus::Completed => "completed",
                RootStatus::Archived => "archived",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "onboarding" => Some(RootStatus::Onboarding),
                "active" => Some(RootStatus::Active),
                "completed" => Some(RootStatus::Completed),
                "archived" => Some(RootStatus::Archived),
                _ => None,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum WorkflowStatus {
        NotStarted,
        InProgress,
        Paused,
        AwaitingFeedback,
        Completed,
        Failed,
    }

    impl WorkflowStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                WorkflowStatus::NotStarted => "not_started",
                WorkflowStatus::InProgress => "in_progress",
                WorkflowStatus::Paused => "paused",
                WorkflowStatus::AwaitingFeedback => "awaiting_feedback",
                WorkflowStatus::Completed => "completed",
                WorkflowStatus::Failed => "failed",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "not_started" => Some(WorkflowStatus::NotStarted),
                "in_progress" => Some(WorkflowStatus::InProgress),
                "paused" => Some(WorkflowStatus::Paused),
                "awaiting_feedback" => Some(WorkflowStatus::AwaitingFeedback),
                "completed" => Some(WorkflowStatus::Completed),
                "failed" => Some(WorkflowStatus::Failed),
                _ => None,
            }
        }

        /// Active instances count toward the one-active-per-(root, name)
        /// invariant: a paused process still owns its concern.
        pub fn is_active(self) -> bool {
            matches!(
                self,
                WorkflowStatus::InProgress
                    | WorkflowStatus::Paused
                    | WorkflowStatus::AwaitingFeedback
            )
        }

        pub fn is_terminal(self) -> bool {
            matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum TaskStatus {
        NotStarted,
        PendingReview,
        PendingFinalApproval,
        Completed,
        Blocked,
    }

    impl TaskStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                TaskStatus::NotStarted => "not_started",
                TaskStatus::PendingReview => "pending_review",
                TaskStatus::PendingFinalApproval => "pending_final_approval",
                TaskStatus::Completed => "completed",
                TaskStatus::Blocked => "blocked",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "not_started" => Some(TaskStatus::NotStarted),
                "pending_review" => Some(TaskStatus::PendingReview),
                "pending_final_approval" => Some(TaskStatus::PendingFinalApproval),
                "completed" => Some(TaskStatus::Completed),
                "blocked" => Some(TaskStatus::Blocked),
                _ => None,
            }
        }

        pub fn is_terminal(self) -> bool {
            matches!(self, TaskStatus::Completed)
        }

        /// Position on the review ladder. `Blocked` sits outside the ladder.
        pub fn rung(self) -> Option<u8> {
            match self {
                TaskStatus::NotStarted => Some(0),
                TaskStatus::PendingReview => Some(1),
                TaskStatus::PendingFinalApproval => Some(2),
                TaskStatus::Completed => Some(3),
                TaskStatus::Blocked => None,
            }
        }
    }

    /// The party responsible for a task, or carrying an approval.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum Party {
        PartyA,
        PartyB,
        Joint,
    }

    impl Party {
        pub fn as_str(self) -> &'static str {
            match self {
                Party::PartyA => "party_a",
                Party::PartyB => "party_b",
                Party::Joint => "joint",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "party_a" => Some(Party::PartyA),
                "party_b" => Some(Party::PartyB),
                "joint" => Some(Party::Joint),
                _ => None,
            }
        }
    }

    /// Role of a member within one root.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Role {
        PrimaryA,
        PrimaryB,
        Delegate,
        Family,
    }

    impl Role {
        pub fn as_str(self) -> &'static str {
            match self {
                Role::PrimaryA => "primary_a",
                Role::PrimaryB => "primary_b",
                Role::Delegate => "delegate",
                Role::Family => "family",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "primary_a" => Some(Role::PrimaryA),
                "primary_b" => Some(Role::PrimaryB),
                "delegate" => Some(Role::Delegate),
                "family" => Some(Role::Family),
                _ => None,
            }
        }

        /// The side a primary member approves for. Delegates and family do
        /// not carry approval authority.
        pub fn party(self) -> Option<Party> {
            match self {
                Role::PrimaryA => Some(Party::PartyA),
                Role::PrimaryB => Some(Party::PartyB),
                Role::Delegate | Role::Family => None,
            }
        }
    }

    /// Who must sign off before a task may complete. Fixed at creation from
    /// the task template; changing it means creating a new task.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ApprovalPolicy {
        NoApproval,
        SingleParty,
        DualParty,
    }

    impl ApprovalPolicy {
        pub fn as_str(self) -> &'static str {
            match self {
                ApprovalPolicy::NoApproval => "none",
                ApprovalPolicy::SingleParty => "single",
                ApprovalPolicy::DualParty => "dual",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "none" => Some(ApprovalPolicy::NoApproval),
                "single" => Some(ApprovalPolicy::SingleParty),
                "dual" => Some(ApprovalPolicy::DualParty),
                _ => None,
            }
        }

        /// Parties whose approval is required for a task owned by `owner`.
        ///
        /// A `SingleParty` policy on a joint-owned task is a template error
        /// and is rejected at task creation, so the combination never reaches
        /// this function through the store.
        pub fn required_parties(self, owner: Party) -> Vec<Party> {
            match self {
                ApprovalPolicy::NoApproval => Vec::new(),
                ApprovalPolicy::SingleParty => vec![owner],
                ApprovalPolicy::DualParty => vec![Party::PartyA, Party::PartyB],
            }
        }

        pub fn requires_review(self) -> bool {
            !matches!(self, ApprovalPolicy::NoApproval)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ApprovalOutcome {
        Pending,
        Approved,
        Rejected,
    }

    impl ApprovalOutcome {
        pub fn as_str(self) -> &'static str {
            match self {
                ApprovalOutcome::Pending => "pending",
                ApprovalOutcome::Approved => "approved",
                ApprovalOutcome::Rejected => "rejected",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "pending" => Some(ApprovalOutcome::Pending),
                "approved" => Some(ApprovalOutcome::Approved),
                "rejected" => Some(ApprovalOutcome::Rejected),
                _ => None,
            }
        }
    }
}
