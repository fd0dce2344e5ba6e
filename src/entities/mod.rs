// Entity Models - Account, Wallet, Transaction
// One account per external customer, one wallet per account,
// many transactions per wallet.

pub mod account;
pub mod transaction;
pub mod wallet;

pub use account::Account;
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use wallet::{Wallet, WalletStatus};
