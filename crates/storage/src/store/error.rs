#![forbid(unsafe_code)]

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    /// A stored column no longer parses into its domain type.
    Corrupt(&'static str),
    /// Optimistic concurrency check failed: another writer advanced the row.
    RevisionMismatch {
        expected: i64,
        actual: i64,
    },
    UnknownId,
    UnknownRoot,
    MemberExists,
    DuplicateActiveWorkflow {
        name: String,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Corrupt(column) => write!(f, "corrupt column: {column}"),
            Self::RevisionMismatch { expected, actual } => {
                write!(f, "revision mismatch (expected={expected}, actual={actual})")
            }
            Self::UnknownId => write!(f, "unknown id"),
            Self::UnknownRoot => write!(f, "unknown root"),
            Self::MemberExists => write!(f, "member already registered for this root"),
            Self::DuplicateActiveWorkflow { name } => {
                write!(f, "an active workflow named {name:?} already exists")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}
