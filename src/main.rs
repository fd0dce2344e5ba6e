// Mini Wallet - CLI
// `init-db` prepares the SQLite schema; `demo` walks the full wallet
// flow against a throwaway in-memory database.

use anyhow::Result;
use std::env;
use std::path::Path;

use mini_wallet::token::SECRET_LENGTH;
use mini_wallet::{setup_database, Ledger, SqliteStore, TokenCodec, TransferRequest, VERSION};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("init-db") => {
            let path = args.get(2).map(String::as_str).unwrap_or("wallet.db");
            run_init_db(Path::new(path))
        }
        Some("demo") => run_demo(),
        _ => {
            println!("mini-wallet {VERSION}");
            println!();
            println!("Usage:");
            println!("  mini-wallet init-db [path]   create the wallet database schema");
            println!("  mini-wallet demo             run the wallet flow in memory");
            Ok(())
        }
    }
}

fn run_init_db(path: &Path) -> Result<()> {
    let conn = mini_wallet::open(path)?;
    setup_database(&conn)?;
    println!("✓ Database ready at {}", path.display());
    Ok(())
}

fn run_demo() -> Result<()> {
    let conn = mini_wallet::open_in_memory()?;
    setup_database(&conn)?;
    let ledger = Ledger::new(
        SqliteStore::new(conn),
        TokenCodec::new(&[42u8; SECRET_LENGTH])?,
    );

    println!("💳 Provisioning account for customer 'cust-1'...");
    let token = ledger.init("cust-1")?;
    let account_id = ledger.authenticate(&token)?;
    println!("✓ Session token issued, account {account_id}");

    println!("\n👛 Enabling wallet...");
    let wallet = ledger.enable(account_id)?;
    println!("✓ Wallet {} enabled, balance {}", wallet.id, wallet.balance);

    println!("\n⬆️  Depositing 10000...");
    let deposit = ledger.deposit(
        account_id,
        TransferRequest {
            reference_id: "demo-deposit".to_string(),
            amount: 10_000,
        },
    )?;
    println!("✓ Deposit {}: {}", deposit.id, deposit.status.as_str());

    println!("\n⬇️  Withdrawing 15000 (more than the balance)...");
    let overdraw = ledger.withdraw(
        account_id,
        TransferRequest {
            reference_id: "demo-overdraw".to_string(),
            amount: 15_000,
        },
    )?;
    println!(
        "✓ Withdrawal {}: {} (guarded decrement refused)",
        overdraw.id,
        overdraw.status.as_str()
    );

    let balance = ledger.get(account_id)?.balance;
    println!("\n💰 Final balance: {balance}");

    let transactions = ledger.transactions(account_id)?;
    println!("🧾 {} transactions on record:", transactions.len());
    for tx in transactions {
        println!(
            "   {} {} {} ({})",
            tx.kind.as_str(),
            tx.amount,
            tx.status.as_str(),
            tx.reference_id
        );
    }

    Ok(())
}
