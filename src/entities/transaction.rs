// 🧾 Transaction Entity - Immutable intent, mutable outcome
//
// Every deposit or withdrawal attempt is recorded as a transaction before
// any balance is touched. The intent (wallet, type, amount, reference) never
// changes; only the status moves, Pending → Success | Failed, and terminal
// states are final. `transacted_at` is set only when the attempt succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// TYPE & STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "success" => Some(TransactionStatus::Success),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

// ============================================================================
// TRANSACTION ENTITY
// ============================================================================

/// One recorded transfer attempt against a wallet.
///
/// Amount is always a positive magnitude; direction comes from `kind`.
/// The reference id is caller-supplied and opaque; the store does not
/// guarantee its uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,

    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,

    /// Positive magnitude in the smallest currency unit
    pub amount: i64,

    /// Caller-supplied reference, opaque to the engine
    pub reference_id: String,

    /// Set only when the attempt reaches Success
    pub transacted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a fresh Pending record for a transfer attempt
    pub fn pending(
        wallet_id: Uuid,
        kind: TransactionType,
        amount: i64,
        reference_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            wallet_id,
            kind,
            status: TransactionStatus::Pending,
            amount,
            reference_id: reference_id.into(),
            transacted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Settle to Success: stamps `transacted_at`
    pub fn settle_success(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Success;
        self.transacted_at = Some(now);
        self.updated_at = now;
    }

    /// Settle to Failed: `transacted_at` stays null
    pub fn settle_failed(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Failed;
        self.transacted_at = None;
        self.updated_at = now;
    }
}
