use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domains::policy::EconomicPolicy;
use crate::kernel::RetryPolicy;

/// Ledger configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub max_txn_attempts: u32,
    pub txn_timeout: Duration,
    /// JSON file with an `EconomicPolicy`; built-in policy when unset
    pub policy_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").ok(),
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "ledger".to_string()),
            max_txn_attempts: env::var("LEDGER_MAX_TXN_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("LEDGER_MAX_TXN_ATTEMPTS must be a valid number")?,
            txn_timeout: Duration::from_millis(
                env::var("LEDGER_TXN_TIMEOUT_MS")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .context("LEDGER_TXN_TIMEOUT_MS must be a valid number")?,
            ),
            policy_path: env::var("LEDGER_POLICY_PATH").ok().map(PathBuf::from),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_txn_attempts.max(1),
            attempt_timeout: self.txn_timeout,
            ..RetryPolicy::default()
        }
    }

    pub fn load_policy(&self) -> Result<EconomicPolicy> {
        EconomicPolicy::load(self.policy_path.as_deref())
    }
}
