/// Errors from audit sinks.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log lock poisoned")]
    LockPoisoned,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;
