// 🗄️ Database Setup - SQLite schema for accounts, wallets, transactions
//
// Three relations: accounts (identity), wallets (balance, 1:1 with
// accounts), transactions (transfer log, 1:N with wallets). Timestamps are
// stored RFC 3339, UUIDs as TEXT, balances/amounts as INTEGER in the
// smallest currency unit. WAL mode for crash recovery.

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the wallet database with WAL and foreign keys on
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// In-memory database for tests and the demo flow
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // WAL is a no-op for in-memory connections but required on disk
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // Accounts Table (identity anchor, unique external customer id)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            external_id TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    // ==========================================================================
    // Wallets Table (one per account, balance guarded non-negative)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS wallets (
            id TEXT PRIMARY KEY,
            owned_by TEXT UNIQUE NOT NULL REFERENCES accounts(id),
            balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
            status TEXT NOT NULL,
            enabled_at TEXT,
            disabled_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    // ==========================================================================
    // Transactions Table (append-mostly transfer log)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            wallet_id TEXT NOT NULL REFERENCES wallets(id),
            type TEXT NOT NULL,
            status TEXT NOT NULL,
            reference_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            transacted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_external_id ON accounts(external_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_wallets_owned_by ON wallets(owned_by)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_wallet_id ON transactions(wallet_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('accounts', 'wallets', 'transactions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_balance_check_constraint_rejects_negative() {
        let conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        conn.execute(
            "INSERT INTO accounts (id, external_id, created_at, updated_at)
             VALUES ('a1', 'cust-1', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO wallets (id, owned_by, balance, status, created_at, updated_at)
             VALUES ('w1', 'a1', -1, 'disabled', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_external_id_unique() {
        let conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        conn.execute(
            "INSERT INTO accounts (id, external_id, created_at, updated_at)
             VALUES ('a1', 'cust-1', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO accounts (id, external_id, created_at, updated_at)
             VALUES ('a2', 'cust-1', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(dup.is_err());
    }
}
