// Error Taxonomy
//
// Four distinct classes, kept apart because the surface treats them
// differently: validation (reject before persistence), business outcomes
// (client-correctable), not-found, and infrastructure failures (always
// surfaced, always abort the enclosing scope). Insufficient funds is NOT
// an error anywhere in this crate - it is the Failed transaction status.

use thiserror::Error;

/// A single structural problem with an inbound value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failures at the store/driver boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched a single-row lookup
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint rejected the write (e.g. duplicate external id)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store cannot serve the request at all (simulated or real outage)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Anything else the driver reports: connection loss, commit failure, ...
    #[error("storage backend error")]
    Backend(#[from] rusqlite::Error),
}

/// Everything the ledger engine can report to a caller
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("wallet already enabled")]
    AlreadyEnabled,

    #[error("wallet already disabled")]
    AlreadyDisabled,

    #[error("wallet disabled")]
    WalletDisabled,

    /// Referenced account or wallet does not exist
    #[error("not found")]
    NotFound,

    /// Session token could not be produced or understood
    #[error("token error: {0}")]
    Token(String),

    #[error(transparent)]
    Store(StoreError),
}

impl LedgerError {
    /// Business errors are expected domain outcomes, not failures
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            LedgerError::AlreadyEnabled | LedgerError::AlreadyDisabled | LedgerError::WalletDisabled
        )
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => LedgerError::NotFound,
            other => LedgerError::Store(other),
        }
    }
}

fn format_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
