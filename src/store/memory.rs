// In-Memory Store - fake backend for tests
//
// Same contracts as the SQLite store, including conflict detection and the
// guarded decrement. A scope works on a staged copy of the whole state;
// commit writes it back, an error drops it, so rollback semantics are real.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{Account, Transaction, Wallet};
use crate::error::StoreError;
use crate::store::{
    AccountFilter, AccountStore, StoreScope, TransactionFilter, TransactionStore, UnitOfWork,
    WalletFilter, WalletStore,
};

#[derive(Debug, Clone, Default)]
struct State {
    accounts: Vec<Account>,
    wallets: Vec<Wallet>,
    transactions: Vec<Transaction>,
}

/// Test double selected by construction where the engine would otherwise
/// take a `SqliteStore`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    fail_transaction_updates: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault hook: make every scoped `update_transaction` fail until reset.
    /// Lets tests exercise the rollback path of the transfer protocol.
    pub fn set_fail_transaction_updates(&self, fail: bool) {
        self.fail_transaction_updates.store(fail, Ordering::SeqCst);
    }
}

struct MemoryScope {
    staged: State,
    fail_transaction_updates: bool,
}

impl UnitOfWork for MemoryStore {
    fn run<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreScope) -> Result<T, StoreError>,
    {
        let staged = self.state.read().unwrap().clone();
        let mut scope = MemoryScope {
            staged,
            fail_transaction_updates: self.fail_transaction_updates.load(Ordering::SeqCst),
        };

        match work(&mut scope) {
            Ok(value) => {
                *self.state.write().unwrap() = scope.staged;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }
}

impl StoreScope for MemoryScope {
    fn create_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self
            .staged
            .accounts
            .iter()
            .any(|a| a.external_customer_id == account.external_customer_id)
        {
            return Err(StoreError::Conflict("accounts.external_id".to_string()));
        }
        self.staged.accounts.push(account.clone());
        Ok(())
    }

    fn create_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        if self.staged.wallets.iter().any(|w| w.owned_by == wallet.owned_by) {
            return Err(StoreError::Conflict("wallets.owned_by".to_string()));
        }
        self.staged.wallets.push(wallet.clone());
        Ok(())
    }

    fn increment_balance(
        &mut self,
        wallet_id: Uuid,
        amount: i64,
        as_of: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        match self.staged.wallets.iter_mut().find(|w| w.id == wallet_id) {
            Some(wallet) => {
                wallet.balance += amount;
                wallet.updated_at = as_of;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn decrement_balance(
        &mut self,
        wallet_id: Uuid,
        amount: i64,
        as_of: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        match self.staged.wallets.iter_mut().find(|w| w.id == wallet_id) {
            Some(wallet) if wallet.balance >= amount => {
                wallet.balance -= amount;
                wallet.updated_at = as_of;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn update_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        if self.fail_transaction_updates {
            return Err(StoreError::Unavailable(
                "transaction updates disabled by test hook".to_string(),
            ));
        }
        if let Some(stored) = self.staged.transactions.iter_mut().find(|t| t.id == tx.id) {
            stored.status = tx.status;
            stored.transacted_at = tx.transacted_at;
            stored.updated_at = tx.updated_at;
        }
        Ok(())
    }
}

impl AccountStore for MemoryStore {
    fn find(&self, filter: &AccountFilter) -> Result<Account, StoreError> {
        let state = self.state.read().unwrap();
        state
            .accounts
            .iter()
            .find(|a| {
                (filter.ids.is_empty() || filter.ids.contains(&a.id))
                    && (filter.external_ids.is_empty()
                        || filter.external_ids.contains(&a.external_customer_id))
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

impl WalletStore for MemoryStore {
    fn find_one(&self, filter: &WalletFilter) -> Result<Wallet, StoreError> {
        let state = self.state.read().unwrap();
        state
            .wallets
            .iter()
            .find(|w| {
                (filter.ids.is_empty() || filter.ids.contains(&w.id))
                    && (filter.owner_ids.is_empty() || filter.owner_ids.contains(&w.owned_by))
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn replace(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        if let Some(stored) = state.wallets.iter_mut().find(|w| w.id == wallet.id) {
            stored.status = wallet.status;
            stored.enabled_at = wallet.enabled_at;
            stored.disabled_at = wallet.disabled_at;
            stored.updated_at = wallet.updated_at;
        }
        Ok(())
    }
}

impl TransactionStore for MemoryStore {
    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.read().unwrap();
        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| {
                (filter.ids.is_empty() || filter.ids.contains(&t.id))
                    && (filter.wallet_ids.is_empty() || filter.wallet_ids.contains(&t.wallet_id))
            })
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    fn create(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        state.transactions.push(tx.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStore, Account, Wallet) {
        let store = MemoryStore::new();
        let account = Account::new("cust-1");
        let wallet = Wallet::new(account.id);
        store
            .run(|scope| {
                scope.create_account(&account)?;
                scope.create_wallet(&wallet)?;
                Ok(())
            })
            .unwrap();
        (store, account, wallet)
    }

    #[test]
    fn test_scope_commit_makes_writes_visible() {
        let (store, account, wallet) = seeded();

        let found = store.find(&AccountFilter::by_external_id("cust-1")).unwrap();
        assert_eq!(found.id, account.id);
        let found = store.find_one(&WalletFilter::by_owner(account.id)).unwrap();
        assert_eq!(found.id, wallet.id);
    }

    #[test]
    fn test_scope_error_discards_staged_writes() {
        let store = MemoryStore::new();
        let account = Account::new("cust-1");

        let err = store
            .run(|scope| {
                scope.create_account(&account)?;
                Err::<(), _>(StoreError::Unavailable("boom".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(matches!(
            store.find(&AccountFilter::by_external_id("cust-1")),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_duplicate_account_is_conflict() {
        let (store, _, _) = seeded();
        let dup = Account::new("cust-1");

        let err = store.run(|scope| scope.create_account(&dup)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_guarded_decrement_matches_sqlite_semantics() {
        let (store, _, wallet) = seeded();

        store
            .run(|scope| scope.increment_balance(wallet.id, 100, Utc::now()))
            .unwrap();

        let affected = store
            .run(|scope| scope.decrement_balance(wallet.id, 101, Utc::now()))
            .unwrap();
        assert_eq!(affected, 0);

        let affected = store
            .run(|scope| scope.decrement_balance(wallet.id, 100, Utc::now()))
            .unwrap();
        assert_eq!(affected, 1);

        let stored = store
            .find_one(&WalletFilter::by_owner(wallet.owned_by))
            .unwrap();
        assert_eq!(stored.balance, 0);
    }

    #[test]
    fn test_fault_hook_fails_scoped_updates_only() {
        let (store, _, wallet) = seeded();
        let tx = Transaction::pending(
            wallet.id,
            crate::entities::TransactionType::Deposit,
            10,
            "r1",
        );
        store.create(&tx).unwrap();

        store.set_fail_transaction_updates(true);
        let err = store.run(|scope| scope.update_transaction(&tx)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_fail_transaction_updates(false);
        store.run(|scope| scope.update_transaction(&tx)).unwrap();
    }
}
