// ⚖️ Ledger Engine - wallet provisioning, lifecycle, and transfers
//
// The engine owns no state of its own: every call resolves the caller's
// wallet from the store, mutates through guarded statements inside atomic
// scopes, and returns. Balance integrity is enforced entirely by the
// store's guarded decrement; the engine never does read-modify-write on a
// balance and never retries.

use chrono::Utc;
use uuid::Uuid;

use crate::entities::{Account, Transaction, TransactionType, Wallet};
use crate::error::{LedgerError, StoreError};
use crate::store::{
    AccountFilter, AccountStore, TransactionFilter, TransactionStore, UnitOfWork, WalletFilter,
    WalletStore,
};
use crate::token::TokenCodec;
use crate::validate::{self, TransferRequest};

/// The ledger engine, generic over its store so tests can run against the
/// in-memory fake and production against SQLite. Dependencies arrive via
/// the constructor; there is no ambient global state.
#[derive(Clone)]
pub struct Ledger<S> {
    store: S,
    tokens: TokenCodec,
}

impl<S> Ledger<S>
where
    S: AccountStore + WalletStore + TransactionStore + UnitOfWork,
{
    pub fn new(store: S, tokens: TokenCodec) -> Self {
        Ledger { store, tokens }
    }

    /// Resolve a bearer token to the account id it was issued for
    pub fn authenticate(&self, token: &str) -> Result<Uuid, LedgerError> {
        self.tokens.decode(token)
    }

    // ========================================================================
    // INIT - account/wallet provisioning
    // ========================================================================

    /// First contact for an external customer id: provision an account and
    /// a disabled zero-balance wallet if none exist yet, then issue a
    /// session token for the account. Idempotent on account identity -
    /// repeated calls return tokens for the same account.
    pub fn init(&self, external_id: &str) -> Result<String, LedgerError> {
        validate::validate_external_id(external_id)?;

        let account_id = match self.store.find(&AccountFilter::by_external_id(external_id)) {
            Ok(existing) => existing.id,
            // NotFound is not an error here; it means "first time"
            Err(StoreError::NotFound) => self.provision(external_id)?,
            Err(err) => return Err(err.into()),
        };

        self.tokens.encode(account_id)
    }

    /// Create the account and its wallet in one scope: no orphan account
    /// or wallet survives a failed attempt. Two concurrent first calls for
    /// the same external id can both get here; the loser's insert hits the
    /// uniqueness constraint and falls back to re-reading the winner.
    fn provision(&self, external_id: &str) -> Result<Uuid, LedgerError> {
        let account = Account::new(external_id);
        let wallet = Wallet::new(account.id);

        let result = self.store.run(|scope| {
            scope.create_account(&account)?;
            scope.create_wallet(&wallet)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                tracing::info!(account_id = %account.id, "provisioned account and wallet");
                Ok(account.id)
            }
            Err(StoreError::Conflict(_)) => {
                let winner = self.store.find(&AccountFilter::by_external_id(external_id))?;
                tracing::debug!(account_id = %winner.id, "lost provisioning race, using existing account");
                Ok(winner.id)
            }
            Err(err) => Err(err.into()),
        }
    }

    // ========================================================================
    // WALLET LIFECYCLE
    // ========================================================================

    /// Enable the caller's wallet. Repeated enables are rejected with a
    /// business error, not silently accepted.
    pub fn enable(&self, account_id: Uuid) -> Result<Wallet, LedgerError> {
        let mut wallet = self.store.find_one(&WalletFilter::by_owner(account_id))?;
        if wallet.is_enabled() {
            return Err(LedgerError::AlreadyEnabled);
        }

        wallet.mark_enabled(Utc::now());
        self.store.replace(&wallet)?;
        Ok(wallet)
    }

    /// Disable the caller's wallet; symmetric with `enable`
    pub fn disable(&self, account_id: Uuid) -> Result<Wallet, LedgerError> {
        let mut wallet = self.store.find_one(&WalletFilter::by_owner(account_id))?;
        if !wallet.is_enabled() {
            return Err(LedgerError::AlreadyDisabled);
        }

        wallet.mark_disabled(Utc::now());
        self.store.replace(&wallet)?;
        Ok(wallet)
    }

    /// View the caller's wallet. A disabled wallet is invisible: reads and
    /// transfers against it fail closed with a business error.
    pub fn get(&self, account_id: Uuid) -> Result<Wallet, LedgerError> {
        let wallet = self.store.find_one(&WalletFilter::by_owner(account_id))?;
        if !wallet.is_enabled() {
            return Err(LedgerError::WalletDisabled);
        }
        Ok(wallet)
    }

    /// List the caller's transactions, newest first; requires the wallet
    /// to be enabled
    pub fn transactions(&self, account_id: Uuid) -> Result<Vec<Transaction>, LedgerError> {
        let wallet = self.get(account_id)?;
        Ok(self.store.list(&TransactionFilter::by_wallet(wallet.id))?)
    }

    // ========================================================================
    // TRANSFERS
    // ========================================================================

    pub fn deposit(
        &self,
        account_id: Uuid,
        request: TransferRequest,
    ) -> Result<Transaction, LedgerError> {
        self.transfer(account_id, TransactionType::Deposit, request)
    }

    pub fn withdraw(
        &self,
        account_id: Uuid,
        request: TransferRequest,
    ) -> Result<Transaction, LedgerError> {
        self.transfer(account_id, TransactionType::Withdrawal, request)
    }

    /// Shared transfer protocol:
    ///
    /// 1. Resolve the wallet (fails closed if missing or disabled).
    /// 2. Record the attempt as a Pending transaction - durable on its own,
    ///    outside any scope, so a crash after this point cannot lose it.
    /// 3. In one atomic scope: attempt the guarded balance mutation, settle
    ///    the transaction to Success (row affected) or Failed (guard
    ///    refused), and persist the terminal state. Balance change and its
    ///    record commit together or not at all.
    ///
    /// A Failed result is a normal return value - insufficient funds is not
    /// an error. Only store/scope failures surface as errors.
    fn transfer(
        &self,
        account_id: Uuid,
        kind: TransactionType,
        request: TransferRequest,
    ) -> Result<Transaction, LedgerError> {
        let wallet = self.get(account_id)?;

        let mut tx = Transaction::pending(wallet.id, kind, request.amount, request.reference_id);
        validate::validate_transaction(&tx)?;

        self.store.create(&tx)?;

        let settled = self.store.run(|scope| {
            let affected = match kind {
                TransactionType::Deposit => {
                    scope.increment_balance(wallet.id, tx.amount, Utc::now())?
                }
                TransactionType::Withdrawal => {
                    scope.decrement_balance(wallet.id, tx.amount, Utc::now())?
                }
            };

            let now = Utc::now();
            if affected == 1 {
                tx.settle_success(now);
            } else {
                tx.settle_failed(now);
            }

            scope.update_transaction(&tx)?;
            Ok(())
        });

        if let Err(err) = settled {
            // The scope rolled back, including any balance change. The
            // Pending record from step 2 remains and is visible in the
            // transaction list until reconciled out-of-band.
            tracing::warn!(
                transaction_id = %tx.id,
                error = %err,
                "transfer scope failed; attempt record left pending"
            );
            return Err(err.into());
        }

        tracing::debug!(
            transaction_id = %tx.id,
            kind = kind.as_str(),
            status = tx.status.as_str(),
            amount = tx.amount,
            "transfer settled"
        );
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::entities::{TransactionStatus, WalletStatus};
    use crate::store::{MemoryStore, SqliteStore};
    use crate::token::SECRET_LENGTH;

    fn codec() -> TokenCodec {
        TokenCodec::new(&[7u8; SECRET_LENGTH]).unwrap()
    }

    fn sqlite_store() -> SqliteStore {
        let conn = db::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        SqliteStore::new(conn)
    }

    fn request(reference: &str, amount: i64) -> TransferRequest {
        TransferRequest {
            reference_id: reference.to_string(),
            amount,
        }
    }

    /// The §8-style end-to-end scenario, shared by both backends
    fn full_flow<S>(store: S)
    where
        S: AccountStore + WalletStore + TransactionStore + UnitOfWork,
    {
        let ledger = Ledger::new(store, codec());

        // First contact provisions a disabled, empty wallet
        let token = ledger.init("cust-1").unwrap();
        let account_id = ledger.authenticate(&token).unwrap();
        let err = ledger.get(account_id).unwrap_err();
        assert!(matches!(err, LedgerError::WalletDisabled));

        // Enable, then fund
        let wallet = ledger.enable(account_id).unwrap();
        assert_eq!(wallet.status, WalletStatus::Enabled);
        assert_eq!(wallet.balance, 0);

        let deposit = ledger.deposit(account_id, request("r1", 10_000)).unwrap();
        assert_eq!(deposit.status, TransactionStatus::Success);
        assert!(deposit.transacted_at.is_some());
        assert_eq!(ledger.get(account_id).unwrap().balance, 10_000);

        // Overdraw attempt fails as a normal outcome, balance untouched
        let overdraw = ledger.withdraw(account_id, request("r2", 15_000)).unwrap();
        assert_eq!(overdraw.status, TransactionStatus::Failed);
        assert!(overdraw.transacted_at.is_none());
        assert_eq!(ledger.get(account_id).unwrap().balance, 10_000);

        // Exact withdrawal drains to zero
        let withdrawal = ledger.withdraw(account_id, request("r3", 10_000)).unwrap();
        assert_eq!(withdrawal.status, TransactionStatus::Success);
        assert_eq!(ledger.get(account_id).unwrap().balance, 0);

        // All three attempts are on the record
        let transactions = ledger.transactions(account_id).unwrap();
        assert_eq!(transactions.len(), 3);
        assert!(transactions.iter().any(|t| t.id == overdraw.id
            && t.status == TransactionStatus::Failed));

        // Disabled wallet hides balance and history
        ledger.disable(account_id).unwrap();
        let err = ledger.transactions(account_id).unwrap_err();
        assert!(matches!(err, LedgerError::WalletDisabled));
    }

    #[test]
    fn test_full_flow_memory() {
        full_flow(MemoryStore::new());
    }

    #[test]
    fn test_full_flow_sqlite() {
        full_flow(sqlite_store());
    }

    #[test]
    fn test_init_requires_external_id() {
        let ledger = Ledger::new(MemoryStore::new(), codec());
        assert!(matches!(
            ledger.init("").unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[test]
    fn test_init_is_idempotent_on_account_identity() {
        let store = MemoryStore::new();
        let ledger = Ledger::new(store.clone(), codec());

        let t1 = ledger.init("cust-1").unwrap();
        let t2 = ledger.init("cust-1").unwrap();

        // Different tokens (fresh nonce), same account behind them
        let a1 = ledger.authenticate(&t1).unwrap();
        let a2 = ledger.authenticate(&t2).unwrap();
        assert_eq!(a1, a2);

        // Exactly one wallet exists for that account
        let wallet = store.find_one(&WalletFilter::by_owner(a1)).unwrap();
        assert_eq!(wallet.balance, 0);
        assert_eq!(wallet.status, WalletStatus::Disabled);
    }

    #[test]
    fn test_provision_race_loser_uses_winning_account() {
        let store = MemoryStore::new();
        let ledger = Ledger::new(store, codec());

        let token = ledger.init("cust-1").unwrap();
        let winner = ledger.authenticate(&token).unwrap();

        // A raced provision attempt hits the uniqueness conflict and must
        // fall back to the already-committed account
        let id = ledger.provision("cust-1").unwrap();
        assert_eq!(id, winner);
    }

    #[test]
    fn test_repeated_enable_is_rejected_without_state_change() {
        let ledger = Ledger::new(MemoryStore::new(), codec());
        let account_id = ledger.authenticate(&ledger.init("cust-1").unwrap()).unwrap();

        let enabled = ledger.enable(account_id).unwrap();
        let err = ledger.enable(account_id).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyEnabled));

        // The rejected call did not touch the wallet
        let current = ledger.get(account_id).unwrap();
        assert_eq!(current.enabled_at, enabled.enabled_at);
        assert_eq!(current.status, WalletStatus::Enabled);
    }

    #[test]
    fn test_repeated_disable_is_rejected() {
        let ledger = Ledger::new(MemoryStore::new(), codec());
        let account_id = ledger.authenticate(&ledger.init("cust-1").unwrap()).unwrap();

        // Fresh wallet is already disabled
        assert!(matches!(
            ledger.disable(account_id).unwrap_err(),
            LedgerError::AlreadyDisabled
        ));

        ledger.enable(account_id).unwrap();
        ledger.disable(account_id).unwrap();
        assert!(matches!(
            ledger.disable(account_id).unwrap_err(),
            LedgerError::AlreadyDisabled
        ));
    }

    #[test]
    fn test_unknown_account_is_not_found() {
        let ledger = Ledger::new(MemoryStore::new(), codec());
        assert!(matches!(
            ledger.get(Uuid::new_v4()).unwrap_err(),
            LedgerError::NotFound
        ));
        assert!(matches!(
            ledger.enable(Uuid::new_v4()).unwrap_err(),
            LedgerError::NotFound
        ));
    }

    #[test]
    fn test_transfer_against_disabled_wallet_persists_nothing() {
        let store = MemoryStore::new();
        let ledger = Ledger::new(store.clone(), codec());
        let account_id = ledger.authenticate(&ledger.init("cust-1").unwrap()).unwrap();

        let err = ledger.deposit(account_id, request("r1", 100)).unwrap_err();
        assert!(matches!(err, LedgerError::WalletDisabled));

        let wallet = store.find_one(&WalletFilter::by_owner(account_id)).unwrap();
        let recorded = store.list(&TransactionFilter::by_wallet(wallet.id)).unwrap();
        assert!(recorded.is_empty());
    }

    #[test]
    fn test_invalid_transfer_aborts_before_persistence() {
        let store = MemoryStore::new();
        let ledger = Ledger::new(store.clone(), codec());
        let account_id = ledger.authenticate(&ledger.init("cust-1").unwrap()).unwrap();
        ledger.enable(account_id).unwrap();

        assert!(matches!(
            ledger.deposit(account_id, request("r1", 0)).unwrap_err(),
            LedgerError::Validation(_)
        ));
        assert!(matches!(
            ledger.deposit(account_id, request("", 100)).unwrap_err(),
            LedgerError::Validation(_)
        ));

        let wallet = store.find_one(&WalletFilter::by_owner(account_id)).unwrap();
        assert!(store
            .list(&TransactionFilter::by_wallet(wallet.id))
            .unwrap()
            .is_empty());
        assert_eq!(wallet.balance, 0);
    }

    #[test]
    fn test_failed_settlement_scope_leaves_pending_record_and_balance() {
        let store = MemoryStore::new();
        let ledger = Ledger::new(store.clone(), codec());
        let account_id = ledger.authenticate(&ledger.init("cust-1").unwrap()).unwrap();
        ledger.enable(account_id).unwrap();
        ledger.deposit(account_id, request("seed", 1_000)).unwrap();

        store.set_fail_transaction_updates(true);
        let err = ledger.deposit(account_id, request("r1", 500)).unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
        store.set_fail_transaction_updates(false);

        // Scope rolled back: no balance change from the failed attempt
        let wallet = store.find_one(&WalletFilter::by_owner(account_id)).unwrap();
        assert_eq!(wallet.balance, 1_000);

        // The durable attempt record remains, still Pending
        let recorded = store.list(&TransactionFilter::by_wallet(wallet.id)).unwrap();
        let pending: Vec<_> = recorded
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reference_id, "r1");
    }

    #[test]
    fn test_concurrent_withdrawals_never_overdraw() {
        let ledger = Ledger::new(sqlite_store(), codec());
        let account_id = ledger.authenticate(&ledger.init("cust-1").unwrap()).unwrap();
        ledger.enable(account_id).unwrap();
        ledger.deposit(account_id, request("seed", 100)).unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    ledger
                        .withdraw(account_id, request(&format!("w{i}"), 30))
                        .unwrap()
                        .status
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|s| *s == TransactionStatus::Success)
            .count();

        // 100 / 30: exactly three guarded decrements can win
        assert_eq!(successes, 3);
        assert_eq!(ledger.get(account_id).unwrap().balance, 10);
    }
}
