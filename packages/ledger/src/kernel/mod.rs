//! Kernel module - ledger infrastructure and dependencies.

pub mod coordinator;
pub mod deps;
pub mod jwt;
pub mod media_validator;
pub mod outbox;
pub mod store;
pub mod test_dependencies;
pub mod traits;
pub mod txn;

pub use coordinator::{
    CommandEnv, Committed, LedgerCommand, RetryPolicy, StatusHint, TransactionCoordinator,
};
pub use deps::LedgerDeps;
pub use jwt::{Claims, JwtAuthVerifier};
pub use media_validator::UrlMediaValidator;
pub use outbox::{EventOutbox, EventReceiver};
pub use store::{DocumentWrite, MemoryStore, PostgresStore, StoreError};
pub use test_dependencies::TestDependencies;
pub use traits::*;
pub use txn::{CommittedTxn, LedgerTxn, TxnPhase};
