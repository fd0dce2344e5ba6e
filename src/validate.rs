// 📐 Structural Validation
// Checks inbound values before anything is persisted. Validation failures
// carry the offending field names so the surface can report them verbatim.

use crate::entities::Transaction;
use crate::error::{FieldError, LedgerError};

/// A transfer request as it arrives from the surface
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub reference_id: String,
    pub amount: i64,
}

/// Validate the Init payload: the external customer id must be present
pub fn validate_external_id(external_id: &str) -> Result<(), LedgerError> {
    let mut errors = Vec::new();

    if external_id.trim().is_empty() {
        errors.push(FieldError {
            field: "customer_xid".to_string(),
            message: "is required".to_string(),
        });
    }

    finish(errors)
}

/// Validate a fully-constructed Pending transaction before it is stored.
///
/// Amount must be at least one smallest-currency unit and the caller must
/// supply a reference id. The enum fields are valid by construction in Rust,
/// so unlike the original wire layer there is nothing to re-check there.
pub fn validate_transaction(tx: &Transaction) -> Result<(), LedgerError> {
    let mut errors = Vec::new();

    if tx.amount < 1 {
        errors.push(FieldError {
            field: "amount".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    if tx.reference_id.trim().is_empty() {
        errors.push(FieldError {
            field: "reference_id".to_string(),
            message: "is required".to_string(),
        });
    }

    finish(errors)
}

fn finish(errors: Vec<FieldError>) -> Result<(), LedgerError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::Validation(errors))
    }
}
