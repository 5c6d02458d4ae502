//! Domain-level error taxonomy for the harness loop.

use std::path::PathBuf;

/// Coarse error classes surfaced to callers (CLI exit codes, summaries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed invocation; nothing was executed.
    Usage,
    /// A scenario step, build, git or role subprocess failed.
    Execution,
    /// External role output was malformed or incomplete.
    ContractValidation,
    /// Artifact, report or baseline read/write failure.
    FileIo,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Usage => "usage",
            ErrorKind::Execution => "execution",
            ErrorKind::ContractValidation => "contract_validation",
            ErrorKind::FileIo => "file_io",
        };
        write!(f, "{s}")
    }
}

/// Harness loop errors.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("{what} timed out after {limit_ms} ms")]
    Timeout { what: String, limit_ms: u64 },

    #[error("build target binary: {0}")]
    Build(String),

    #[error("git error: {0}")]
    GitError(String),

    #[error("external role {role} failed: {reason}")]
    RoleFailed { role: String, reason: String },

    #[error("contract validation failed: {0}")]
    ContractValidation(String),

    #[error("{message}; {hint}")]
    ArtifactMissing { message: String, hint: String },

    #[error("read {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Map this error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::Usage(_) => ErrorKind::Usage,
            HarnessError::Execution(_)
            | HarnessError::Timeout { .. }
            | HarnessError::Build(_)
            | HarnessError::GitError(_)
            | HarnessError::RoleFailed { .. } => ErrorKind::Execution,
            HarnessError::ContractValidation(_) => ErrorKind::ContractValidation,
            HarnessError::ArtifactMissing { .. }
            | HarnessError::ReadFile { .. }
            | HarnessError::Serialization(_)
            | HarnessError::Io(_) => ErrorKind::FileIo,
        }
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
