//! Document store abstraction.
//!
//! The ledger needs a store with serializable, retryable transactions:
//! reads are tracked, writes are buffered and applied together at commit,
//! and a commit that lost a race fails with [`StoreError::Conflict`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::common::{MemberId, OperationId};
use crate::domains::member::models::Member;
use crate::domains::operations::models::{Operation, OperationQuery};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Another transaction committed over our read set. Retry.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Transaction timed out")]
    Timeout,

    #[error("Read issued after the write phase began")]
    ReadAfterWrite,

    #[error("Transaction already committed or rolled back")]
    Closed,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Timeout)
    }
}

/// Serialization failures, deadlocks and unique violations lose a race with
/// a concurrent commit; everything else is a real database error.
impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        let code = error
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());
        match code.as_deref() {
            Some("40001") | Some("40P01") | Some("23505") => {
                Self::Conflict(format!("database reported {}", error))
            }
            _ => Self::Database(error),
        }
    }
}

/// A buffered write, applied at commit.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    /// Create or replace a member projection.
    PutMember(Member),
    /// Append to the log. Operations are never updated.
    InsertOperation(Operation),
}

#[async_trait]
pub trait BaseDocumentStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// One optimistic transaction.
///
/// Reads join the transaction's read set. `commit` applies every write or
/// none of them.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn read_member(&mut self, id: MemberId) -> Result<Option<Member>, StoreError>;

    async fn read_operation(&mut self, id: OperationId) -> Result<Option<Operation>, StoreError>;

    /// Matching operations, oldest first.
    async fn query_operations(
        &mut self,
        query: &OperationQuery,
    ) -> Result<Vec<Operation>, StoreError>;

    /// Every member projection (audit and replay).
    async fn list_members(&mut self) -> Result<Vec<Member>, StoreError>;

    async fn commit(&mut self, writes: Vec<DocumentWrite>) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}
