// Store Contracts - repositories + atomic unit-of-work
//
// Each store is a trait with exactly the operations the engine needs; one
// production implementation (SQLite) and one in-memory fake for tests,
// selected by construction. Operations that must be atomic with other
// writes live on `StoreScope`: the handle a `UnitOfWork::run` closure
// receives, whose effects commit together or not at all.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{Account, Transaction, Wallet};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// ============================================================================
// FILTERS
// ============================================================================
// An empty list leaves that column unconstrained; lookups are implicitly
// LIMIT 1 and signal NotFound when no row matches.

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub ids: Vec<Uuid>,
    pub external_ids: Vec<String>,
}

impl AccountFilter {
    pub fn by_external_id(external_id: impl Into<String>) -> Self {
        AccountFilter {
            external_ids: vec![external_id.into()],
            ..Default::default()
        }
    }

    pub fn by_id(id: Uuid) -> Self {
        AccountFilter {
            ids: vec![id],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WalletFilter {
    pub ids: Vec<Uuid>,
    pub owner_ids: Vec<Uuid>,
}

impl WalletFilter {
    pub fn by_owner(owner_id: Uuid) -> Self {
        WalletFilter {
            owner_ids: vec![owner_id],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub ids: Vec<Uuid>,
    pub wallet_ids: Vec<Uuid>,
}

impl TransactionFilter {
    pub fn by_wallet(wallet_id: Uuid) -> Self {
        TransactionFilter {
            wallet_ids: vec![wallet_id],
            ..Default::default()
        }
    }
}

// ============================================================================
// ATOMIC SCOPE
// ============================================================================

/// Mutations available inside an atomic scope.
///
/// Everything invoked on one scope commits or rolls back as a unit. The
/// increment/decrement pair is the only way balances move: `decrement` is
/// guarded by the store (`balance >= amount` evaluated in the same
/// statement that subtracts), which is what keeps balances non-negative
/// under concurrent withdrawals without any application-level locking.
pub trait StoreScope {
    fn create_account(&mut self, account: &Account) -> Result<(), StoreError>;

    fn create_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError>;

    /// Unconditionally add `amount` to the wallet balance.
    /// Returns the number of rows matched (0 if the wallet does not exist).
    fn increment_balance(
        &mut self,
        wallet_id: Uuid,
        amount: i64,
        as_of: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Subtract `amount` only if the current balance covers it.
    /// Returns 1 when the guarded update took effect, 0 when the guard
    /// failed (insufficient funds) or the wallet does not exist.
    fn decrement_balance(
        &mut self,
        wallet_id: Uuid,
        amount: i64,
        as_of: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Update status / transacted_at / updated_at of an existing transaction
    fn update_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError>;
}

/// Runs a closure inside an atomic scope: commit on Ok, rollback on Err,
/// the closure's result propagated either way. No partial effects of the
/// scope are observable unless the commit succeeds.
pub trait UnitOfWork {
    fn run<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreScope) -> Result<T, StoreError>;
}

// ============================================================================
// REPOSITORIES
// ============================================================================

pub trait AccountStore {
    /// Single-row lookup; NotFound when no account matches
    fn find(&self, filter: &AccountFilter) -> Result<Account, StoreError>;
}

pub trait WalletStore {
    /// Single-row lookup; NotFound when no wallet matches
    fn find_one(&self, filter: &WalletFilter) -> Result<Wallet, StoreError>;

    /// Unconditional overwrite of status, enabled_at, disabled_at and
    /// updated_at for the wallet with this id. Not atomic with anything
    /// else - callers must not use it for balance-adjacent changes.
    fn replace(&self, wallet: &Wallet) -> Result<(), StoreError>;
}

pub trait TransactionStore {
    /// All matching transactions, newest first, eagerly materialized
    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, StoreError>;

    /// Insert a Pending record. Deliberately NOT scoped with the balance
    /// mutation it precedes: the attempt record must survive a crash of
    /// the mutation that follows it.
    fn create(&self, tx: &Transaction) -> Result<(), StoreError>;
}
