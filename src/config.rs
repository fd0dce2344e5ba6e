// Process Configuration - environment-driven, read once at startup
//
// The library never reads the environment on its own; binaries call
// `Config::from_env()` after loading .env and pass the pieces down by
// construction.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use crate::token::SECRET_LENGTH;

const ENV_DB_PATH: &str = "WALLET_DB_PATH";
const ENV_TOKEN_SECRET: &str = "WALLET_TOKEN_SECRET";
const ENV_LISTEN_ADDR: &str = "WALLET_LISTEN_ADDR";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub token_secret: Vec<u8>,
    pub listen_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let db_path = env::var(ENV_DB_PATH)
            .unwrap_or_else(|_| "wallet.db".to_string())
            .into();

        let token_secret = env::var(ENV_TOKEN_SECRET)
            .with_context(|| format!("{ENV_TOKEN_SECRET} is required"))?
            .into_bytes();
        if token_secret.len() != SECRET_LENGTH {
            bail!("{ENV_TOKEN_SECRET} must be exactly {SECRET_LENGTH} bytes");
        }

        let listen_addr =
            env::var(ENV_LISTEN_ADDR).unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        Ok(Config {
            db_path,
            token_secret,
            listen_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_and_required_secret() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var(ENV_DB_PATH);
        env::remove_var(ENV_LISTEN_ADDR);
        env::set_var(ENV_TOKEN_SECRET, "0123456789abcdef0123456789abcdef");

        let config = Config::from_env().unwrap();
        assert_eq!(config.db_path, PathBuf::from("wallet.db"));
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.token_secret.len(), SECRET_LENGTH);

        env::remove_var(ENV_TOKEN_SECRET);
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_secret_length_is_enforced() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var(ENV_TOKEN_SECRET, "too-short");
        assert!(Config::from_env().is_err());
        env::remove_var(ENV_TOKEN_SECRET);
    }
}
