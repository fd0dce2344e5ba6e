// 💳 Account Entity - Identity anchor for a wallet
//
// An account is the stable identity behind one wallet. It is keyed by the
// customer's external identifier (whatever id the upstream system uses for
// that customer) and never changes after creation. Wallets and transactions
// hang off the account's UUID, not the external id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity record: one per external customer id, created on first Init.
///
/// The external id is immutable once set; renames upstream do not touch the
/// account UUID, so wallet and transaction history stay attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identity (UUID) - never changes
    pub id: Uuid,

    /// External customer identifier (unique, immutable)
    pub external_customer_id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account for an external customer id
    pub fn new(external_customer_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            external_customer_id: external_customer_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation() {
        let account = Account::new("cust-1");

        assert!(!account.id.is_nil());
        assert_eq!(account.external_customer_id, "cust-1");
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn test_account_ids_are_unique() {
        let a = Account::new("cust-1");
        let b = Account::new("cust-1");
        assert_ne!(a.id, b.id);
    }
}
