// Mini Wallet - Core Library
// Per-account monetary balances with an auditable transaction log.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod store;
pub mod token;
pub mod validate;

// Re-export commonly used types
pub use config::Config;
pub use db::{open, open_in_memory, setup_database};
pub use engine::Ledger;
pub use entities::{
    Account, Transaction, TransactionStatus, TransactionType, Wallet, WalletStatus,
};
pub use error::{FieldError, LedgerError, StoreError};
pub use store::{
    AccountFilter, AccountStore, MemoryStore, SqliteStore, StoreScope, TransactionFilter,
    TransactionStore, UnitOfWork, WalletFilter, WalletStore,
};
pub use token::TokenCodec;
pub use validate::TransferRequest;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
