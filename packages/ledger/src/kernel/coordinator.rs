//! Transaction coordinator.
//!
//! Runs a command as `Begin -> Read -> Validate -> Write -> Commit | Abort`.
//! Store contention and attempt timeouts are retried with exponential
//! backoff; validation failures abort immediately. The attempt timeout only
//! bounds the read, validate and write phases. Once a commit is issued it
//! runs to completion, since a commit cut short may still have landed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::store::{BaseDocumentStore, StoreError};
use super::txn::LedgerTxn;
use super::{BaseClock, BaseMediaValidator};
use crate::common::LedgerError;
use crate::domains::abilities::AbilityEvaluator;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation};
use crate::domains::policy::EconomicPolicy;

/// Success status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    /// Existing result returned, nothing written
    Ok,
    Created,
}

impl StatusHint {
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
        }
    }
}

/// Read-only context handed to a command on every attempt.
pub struct CommandEnv<'a> {
    pub policy: &'a EconomicPolicy,
    pub abilities: &'a AbilityEvaluator,
    pub media: &'a dyn BaseMediaValidator,
    /// Taken from the clock at the start of the attempt.
    pub now: DateTime<Utc>,
}

/// A ledger command. `apply` may run several times, so it must only touch
/// state through the transaction.
#[async_trait]
pub trait LedgerCommand: Send + Sync {
    fn op_code(&self) -> OpCode;

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(10),
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct Committed {
    pub operations: Vec<Operation>,
    pub events: Vec<LedgerEvent>,
    pub status: StatusHint,
}

pub struct TransactionCoordinator {
    store: Arc<dyn BaseDocumentStore>,
    clock: Arc<dyn BaseClock>,
    media: Arc<dyn BaseMediaValidator>,
    policy: Arc<EconomicPolicy>,
    abilities: AbilityEvaluator,
    retry: RetryPolicy,
}

impl TransactionCoordinator {
    /// Fails when the policy is unusable, e.g. has no periods.
    pub fn new(
        store: Arc<dyn BaseDocumentStore>,
        clock: Arc<dyn BaseClock>,
        media: Arc<dyn BaseMediaValidator>,
        policy: Arc<EconomicPolicy>,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        policy.validate()?;
        let abilities = AbilityEvaluator::from_policy(&policy);
        Ok(Self {
            store,
            clock,
            media,
            policy,
            abilities,
            retry,
        })
    }

    pub fn policy(&self) -> &EconomicPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn BaseDocumentStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn execute<C>(&self, command: &C) -> Result<Committed, LedgerError>
    where
        C: LedgerCommand + ?Sized,
    {
        let op_code = command.op_code();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(command).await {
                Ok(committed) => {
                    debug!(
                        op_code = %op_code,
                        attempt,
                        operations = committed.operations.len(),
                        "Ledger transaction committed"
                    );
                    return Ok(committed);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= self.retry.max_attempts {
                        error!(op_code = %op_code, attempts = attempt, error = %e, "Ledger transaction gave up");
                        return Err(LedgerError::TransactionFailed { attempts: attempt });
                    }
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        op_code = %op_code,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying ledger transaction"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(op_code = %op_code, error = %e, "Ledger command rejected");
                    return Err(e);
                }
            }
        }
    }

    async fn attempt<C>(&self, command: &C) -> Result<Committed, LedgerError>
    where
        C: LedgerCommand + ?Sized,
    {
        let env = CommandEnv {
            policy: &self.policy,
            abilities: &self.abilities,
            media: self.media.as_ref(),
            now: self.clock.now(),
        };

        let prepared = tokio::time::timeout(self.retry.attempt_timeout, async {
            let mut txn = LedgerTxn::new(self.store.begin().await?);
            let applied = command.apply(&mut txn, &env).await;
            Ok::<_, LedgerError>((txn, applied))
        })
        .await;

        let (txn, applied) = match prepared {
            Ok(prepared) => prepared?,
            Err(_) => return Err(LedgerError::Store(StoreError::Timeout)),
        };

        match applied {
            Ok(status) => {
                let committed = txn.commit().await?;
                Ok(Committed {
                    operations: committed.operations,
                    events: committed.events,
                    status,
                })
            }
            Err(e) => {
                txn.abort().await;
                Err(e)
            }
        }
    }
}
