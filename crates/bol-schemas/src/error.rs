use thiserror::Error;

/// Error taxonomy shared by every ledger operation.
///
/// Only [`LedgerError::TransientConflict`] is retried automatically; the
/// others are surfaced to the caller or recorded for operator triage.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Referenced account, instrument or lot does not exist.
    #[error("not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    /// Authoritative figures cannot be reconciled against local state.
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    /// Serialization failure or deadlock between concurrent writers.
    #[error("transient conflict: {0}")]
    TransientConflict(String),

    /// A write would leave the ledger in an impossible state.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Infrastructure failure that is none of the above.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientConflict(_))
    }

    /// Stable code stored on batch-error records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DataInconsistency(_) => "DATA_INCONSISTENCY",
            Self::TransientConflict(_) => "TRANSIENT_CONFLICT",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Storage(_) => "STORAGE",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
