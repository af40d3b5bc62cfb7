//! One ledger transaction: a store transaction plus the write buffer.
//!
//! Commands read everything they need first, then buffer writes. The first
//! buffered write switches the transaction into its write phase and any read
//! after that is rejected, so validation can never observe its own writes.

use tracing::warn;

use super::store::{DocumentWrite, StoreError, StoreTransaction};
use crate::common::{LedgerError, MemberId, OperationId};
use crate::domains::member::models::Member;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{Operation, OperationQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnPhase {
    Reading,
    Writing,
}

/// What a committed transaction produced.
#[derive(Debug, Clone, Default)]
pub struct CommittedTxn {
    /// Operations in the outcome, appended or reused, in command order.
    pub operations: Vec<Operation>,
    /// Events to publish now that the commit is durable.
    pub events: Vec<LedgerEvent>,
}

pub struct LedgerTxn {
    inner: Box<dyn StoreTransaction>,
    phase: TxnPhase,
    members: Vec<Member>,
    appended: Vec<Operation>,
    outcome: Vec<Operation>,
    events: Vec<LedgerEvent>,
}

impl LedgerTxn {
    pub fn new(inner: Box<dyn StoreTransaction>) -> Self {
        Self {
            inner,
            phase: TxnPhase::Reading,
            members: Vec::new(),
            appended: Vec::new(),
            outcome: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> TxnPhase {
        self.phase
    }

    fn ensure_reading(&self) -> Result<(), StoreError> {
        match self.phase {
            TxnPhase::Reading => Ok(()),
            TxnPhase::Writing => Err(StoreError::ReadAfterWrite),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn member(&mut self, id: MemberId) -> Result<Option<Member>, LedgerError> {
        self.ensure_reading()?;
        Ok(self.inner.read_member(id).await?)
    }

    pub async fn require_member(&mut self, id: MemberId) -> Result<Member, LedgerError> {
        self.member(id)
            .await?
            .ok_or(LedgerError::MemberNotFound(id))
    }

    pub async fn operation(&mut self, id: OperationId) -> Result<Option<Operation>, LedgerError> {
        self.ensure_reading()?;
        Ok(self.inner.read_operation(id).await?)
    }

    pub async fn find_operations(
        &mut self,
        query: &OperationQuery,
    ) -> Result<Vec<Operation>, LedgerError> {
        self.ensure_reading()?;
        Ok(self.inner.query_operations(query).await?)
    }

    /// First (oldest) matching operation.
    pub async fn find_operation(
        &mut self,
        query: &OperationQuery,
    ) -> Result<Option<Operation>, LedgerError> {
        Ok(self.find_operations(query).await?.into_iter().next())
    }

    pub async fn list_members(&mut self) -> Result<Vec<Member>, LedgerError> {
        self.ensure_reading()?;
        Ok(self.inner.list_members().await?)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Buffer a member projection. A later put for the same id replaces it.
    pub fn put_member(&mut self, member: Member) {
        self.phase = TxnPhase::Writing;
        match self.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }

    /// Buffer a new operation for the log.
    pub fn append(&mut self, operation: Operation) {
        self.phase = TxnPhase::Writing;
        self.outcome.push(operation.clone());
        self.appended.push(operation);
    }

    /// Report an existing operation as this request's result without
    /// writing anything (idempotent replays).
    pub fn reuse(&mut self, operation: Operation) {
        self.outcome.push(operation);
    }

    /// Queue an event for after the commit.
    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn has_writes(&self) -> bool {
        !self.members.is_empty() || !self.appended.is_empty()
    }

    // =========================================================================
    // Completion
    // =========================================================================

    pub async fn commit(mut self) -> Result<CommittedTxn, StoreError> {
        if !self.has_writes() {
            self.inner.rollback().await?;
        } else {
            let writes = self
                .appended
                .into_iter()
                .map(DocumentWrite::InsertOperation)
                .chain(self.members.into_iter().map(DocumentWrite::PutMember))
                .collect();
            self.inner.commit(writes).await?;
        }

        Ok(CommittedTxn {
            operations: self.outcome,
            events: self.events,
        })
    }

    /// Drop every buffered write.
    pub async fn abort(mut self) {
        if let Err(e) = self.inner.rollback().await {
            warn!(error = %e, "Failed to roll back ledger transaction");
        }
    }
}
