// SQLite Store - production persistence for accounts, wallets, transactions
//
// UUIDs are stored as TEXT, timestamps as RFC 3339 TEXT, balances and
// amounts as INTEGER. The atomic scope is a rusqlite transaction; the
// guarded decrement is a single conditional UPDATE, so two racing
// withdrawals can never both succeed past the balance.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::entities::{Account, Transaction, TransactionStatus, TransactionType, Wallet, WalletStatus};
use crate::error::StoreError;
use crate::store::{
    AccountFilter, AccountStore, StoreScope, TransactionFilter, TransactionStore, UnitOfWork,
    WalletFilter, WalletStore,
};

/// Production store backed by a shared SQLite connection.
///
/// The connection is behind a mutex so the store can be shared across
/// request handlers; all blocking happens here and at the scope boundary.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Self {
        SqliteStore { conn }
    }
}

// ============================================================================
// UNIT OF WORK
// ============================================================================

struct SqliteScope<'conn> {
    tx: &'conn rusqlite::Transaction<'conn>,
}

impl UnitOfWork for SqliteStore {
    fn run<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreScope) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(StoreError::Backend)?;

        let result = {
            let mut scope = SqliteScope { tx: &tx };
            work(&mut scope)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(StoreError::Backend)?;
                Ok(value)
            }
            Err(err) => {
                // Dropping the transaction would also roll back; be explicit.
                tracing::debug!(error = %err, "rolling back store scope");
                let _ = tx.rollback();
                Err(err)
            }
        }
    }
}

impl StoreScope for SqliteScope<'_> {
    fn create_account(&mut self, account: &Account) -> Result<(), StoreError> {
        let result = self.tx.execute(
            "INSERT INTO accounts (id, external_id, created_at, updated_at, deleted_at, is_active)
             VALUES (?1, ?2, ?3, ?4, NULL, 1)",
            params![
                account.id.to_string(),
                account.external_customer_id,
                account.created_at.to_rfc3339(),
                account.updated_at.to_rfc3339(),
            ],
        );
        map_insert_result(result, "accounts.external_id")
    }

    fn create_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        let result = self.tx.execute(
            "INSERT INTO wallets (id, owned_by, balance, status, enabled_at, disabled_at,
                                  created_at, updated_at, deleted_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, 1)",
            params![
                wallet.id.to_string(),
                wallet.owned_by.to_string(),
                wallet.balance,
                wallet.status.as_str(),
                wallet.enabled_at.map(|t| t.to_rfc3339()),
                wallet.disabled_at.map(|t| t.to_rfc3339()),
                wallet.created_at.to_rfc3339(),
                wallet.updated_at.to_rfc3339(),
            ],
        );
        map_insert_result(result, "wallets.owned_by")
    }

    fn increment_balance(
        &mut self,
        wallet_id: Uuid,
        amount: i64,
        as_of: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let affected = self.tx.execute(
            "UPDATE wallets SET balance = balance + ?1, updated_at = ?2 WHERE id = ?3",
            params![amount, as_of.to_rfc3339(), wallet_id.to_string()],
        )?;
        Ok(affected)
    }

    fn decrement_balance(
        &mut self,
        wallet_id: Uuid,
        amount: i64,
        as_of: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        // The guard and the subtraction are one statement: there is no
        // window between checking the balance and changing it.
        let affected = self.tx.execute(
            "UPDATE wallets SET balance = balance - ?1, updated_at = ?2
             WHERE id = ?3 AND balance >= ?1",
            params![amount, as_of.to_rfc3339(), wallet_id.to_string()],
        )?;
        Ok(affected)
    }

    fn update_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE transactions SET status = ?1, transacted_at = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                tx.status.as_str(),
                tx.transacted_at.map(|t| t.to_rfc3339()),
                tx.updated_at.to_rfc3339(),
                tx.id.to_string(),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// REPOSITORIES
// ============================================================================

impl AccountStore for SqliteStore {
    fn find(&self, filter: &AccountFilter) -> Result<Account, StoreError> {
        let mut sql = String::from(
            "SELECT id, external_id, created_at, updated_at
             FROM accounts WHERE is_active = 1",
        );
        let mut args: Vec<String> = Vec::new();
        push_in_clause(&mut sql, &mut args, "id", &uuid_strings(&filter.ids));
        push_in_clause(&mut sql, &mut args, "external_id", &filter.external_ids);
        sql.push_str(" LIMIT 1");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter()))?;
        match rows.next()? {
            Some(row) => Ok(read_account(row)?),
            None => Err(StoreError::NotFound),
        }
    }
}

impl WalletStore for SqliteStore {
    fn find_one(&self, filter: &WalletFilter) -> Result<Wallet, StoreError> {
        let mut sql = String::from(
            "SELECT id, owned_by, balance, status, enabled_at, disabled_at,
                    created_at, updated_at
             FROM wallets WHERE 1 = 1",
        );
        let mut args: Vec<String> = Vec::new();
        push_in_clause(&mut sql, &mut args, "id", &uuid_strings(&filter.ids));
        push_in_clause(&mut sql, &mut args, "owned_by", &uuid_strings(&filter.owner_ids));
        sql.push_str(" LIMIT 1");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter()))?;
        match rows.next()? {
            Some(row) => Ok(read_wallet(row)?),
            None => Err(StoreError::NotFound),
        }
    }

    fn replace(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE wallets SET status = ?1, enabled_at = ?2, disabled_at = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                wallet.status.as_str(),
                wallet.enabled_at.map(|t| t.to_rfc3339()),
                wallet.disabled_at.map(|t| t.to_rfc3339()),
                wallet.updated_at.to_rfc3339(),
                wallet.id.to_string(),
            ],
        )?;
        Ok(())
    }
}

impl TransactionStore for SqliteStore {
    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, StoreError> {
        let mut sql = String::from(
            "SELECT id, wallet_id, type, status, reference_id, amount,
                    transacted_at, created_at, updated_at
             FROM transactions WHERE is_active = 1",
        );
        let mut args: Vec<String> = Vec::new();
        push_in_clause(&mut sql, &mut args, "id", &uuid_strings(&filter.ids));
        push_in_clause(&mut sql, &mut args, "wallet_id", &uuid_strings(&filter.wallet_ids));
        sql.push_str(" ORDER BY created_at DESC");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), read_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    fn create(&self, tx: &Transaction) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO transactions (id, wallet_id, type, status, reference_id, amount,
                                       transacted_at, created_at, updated_at, deleted_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, NULL, 1)",
            params![
                tx.id.to_string(),
                tx.wallet_id.to_string(),
                tx.kind.as_str(),
                tx.status.as_str(),
                tx.reference_id,
                tx.amount,
                tx.created_at.to_rfc3339(),
                tx.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// ROW READERS & HELPERS
// ============================================================================

fn uuid_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn push_in_clause(sql: &mut String, args: &mut Vec<String>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    let placeholders = vec!["?"; values.len()].join(", ");
    sql.push_str(&format!(" AND {column} IN ({placeholders})"));
    args.extend(values.iter().cloned());
}

fn map_insert_result(result: rusqlite::Result<usize>, constraint: &str) -> Result<(), StoreError> {
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(StoreError::Conflict(constraint.to_string()))
        }
        Err(e) => Err(StoreError::Backend(e)),
    }
}

fn read_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        external_customer_id: row.get(1)?,
        created_at: parse_ts(2, &row.get::<_, String>(2)?)?,
        updated_at: parse_ts(3, &row.get::<_, String>(3)?)?,
    })
}

fn read_wallet(row: &Row<'_>) -> rusqlite::Result<Wallet> {
    let status: String = row.get(3)?;
    Ok(Wallet {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        owned_by: parse_uuid(1, &row.get::<_, String>(1)?)?,
        balance: row.get(2)?,
        status: WalletStatus::parse(&status)
            .ok_or_else(|| bad_enum(3, "wallet status", &status))?,
        enabled_at: parse_opt_ts(4, row.get(4)?)?,
        disabled_at: parse_opt_ts(5, row.get(5)?)?,
        created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
        updated_at: parse_ts(7, &row.get::<_, String>(7)?)?,
    })
}

fn read_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(2)?;
    let status: String = row.get(3)?;
    Ok(Transaction {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        wallet_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        kind: TransactionType::parse(&kind)
            .ok_or_else(|| bad_enum(2, "transaction type", &kind))?,
        status: TransactionStatus::parse(&status)
            .ok_or_else(|| bad_enum(3, "transaction status", &status))?,
        reference_id: row.get(4)?,
        amount: row.get(5)?,
        transacted_at: parse_opt_ts(6, row.get(6)?)?,
        created_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        updated_at: parse_ts(8, &row.get::<_, String>(8)?)?,
    })
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

fn bad_enum(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid {what}: {value}").into(),
    )
}
