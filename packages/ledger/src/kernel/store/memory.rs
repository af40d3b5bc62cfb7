//! In-process optimistic store.
//!
//! Members carry a version; a transaction remembers the version of every
//! member it read (or that it was absent) and the length of the operation log
//! at its first log access. Log reads only see that prefix. Commit fails with
//! a conflict when a read member changed, or when an operation appended since
//! the snapshot matches one of the transaction's queries or point reads.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{BaseDocumentStore, DocumentWrite, StoreError, StoreTransaction};
use crate::common::{MemberId, OperationId};
use crate::domains::member::models::Member;
use crate::domains::operations::models::{Operation, OperationQuery};

#[derive(Default)]
struct MemoryState {
    members: HashMap<MemberId, (Member, u64)>,
    operations: Vec<Operation>,
    operation_index: HashMap<OperationId, usize>,
}

impl MemoryState {
    fn member_version(&self, id: &MemberId) -> Option<u64> {
        self.members.get(id).map(|(_, version)| *version)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    injected_conflicts: Arc<AtomicU32>,
    commits: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a member outside the ledger (system accounts, fixtures).
    pub fn seed_member(&self, member: Member) {
        let mut state = self.lock();
        let version = state.member_version(&member.id).unwrap_or(0) + 1;
        state.members.insert(member.id, (member, version));
    }

    pub fn member(&self, id: MemberId) -> Option<Member> {
        self.lock().members.get(&id).map(|(member, _)| member.clone())
    }

    pub fn members(&self) -> Vec<Member> {
        self.lock()
            .members
            .values()
            .map(|(member, _)| member.clone())
            .collect()
    }

    /// Full log, in commit order.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Make the next `count` commits fail with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of successful commits that wrote something.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseDocumentStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            member_reads: HashMap::new(),
            operation_reads: Vec::new(),
            queries: Vec::new(),
            log_snapshot: None,
            closed: false,
        }))
    }
}

pub struct MemoryTransaction {
    store: MemoryStore,
    /// First version observed per member; `None` means it was absent.
    member_reads: HashMap<MemberId, Option<u64>>,
    operation_reads: Vec<OperationId>,
    queries: Vec<OperationQuery>,
    log_snapshot: Option<usize>,
    closed: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn snapshot_len(&mut self, state: &MemoryState) -> usize {
        *self.log_snapshot.get_or_insert(state.operations.len())
    }

    fn validate(&self, state: &MemoryState) -> Result<(), StoreError> {
        for (id, seen) in &self.member_reads {
            if state.member_version(id) != *seen {
                return Err(StoreError::Conflict(format!("member {} changed", id)));
            }
        }

        if let Some(snapshot) = self.log_snapshot {
            for op in &state.operations[snapshot..] {
                if self.operation_reads.contains(&op.id)
                    || self.queries.iter().any(|query| query.matches(op))
                {
                    return Err(StoreError::Conflict(format!(
                        "operation {} appended over a read",
                        op.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn read_member(&mut self, id: MemberId) -> Result<Option<Member>, StoreError> {
        self.ensure_open()?;
        let store = self.store.clone();
        let state = store.lock();
        let entry = state.members.get(&id);
        self.member_reads
            .entry(id)
            .or_insert_with(|| entry.map(|(_, version)| *version));
        Ok(entry.map(|(member, _)| member.clone()))
    }

    async fn read_operation(&mut self, id: OperationId) -> Result<Option<Operation>, StoreError> {
        self.ensure_open()?;
        let store = self.store.clone();
        let state = store.lock();
        let snapshot = self.snapshot_len(&state);
        self.operation_reads.push(id);
        Ok(state
            .operation_index
            .get(&id)
            .filter(|index| **index < snapshot)
            .map(|index| state.operations[*index].clone()))
    }

    async fn query_operations(
        &mut self,
        query: &OperationQuery,
    ) -> Result<Vec<Operation>, StoreError> {
        self.ensure_open()?;
        let store = self.store.clone();
        let state = store.lock();
        let snapshot = self.snapshot_len(&state);
        self.queries.push(query.clone());
        Ok(state.operations[..snapshot]
            .iter()
            .filter(|op| query.matches(op))
            .cloned()
            .collect())
    }

    async fn list_members(&mut self) -> Result<Vec<Member>, StoreError> {
        self.ensure_open()?;
        let store = self.store.clone();
        let state = store.lock();
        let mut members: Vec<Member> = state
            .members
            .values()
            .map(|(member, version)| {
                self.member_reads.entry(member.id).or_insert(Some(*version));
                member.clone()
            })
            .collect();
        members.sort_by_key(|member| (member.created_at, member.id));
        Ok(members)
    }

    async fn commit(&mut self, writes: Vec<DocumentWrite>) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.closed = true;

        let store = self.store.clone();
        let mut state = store.lock();

        let injected = store.injected_conflicts.load(Ordering::SeqCst);
        if injected > 0 {
            store.injected_conflicts.store(injected - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }

        self.validate(&state)?;

        // Duplicate op ids would break the log; check before touching state.
        for write in &writes {
            if let DocumentWrite::InsertOperation(op) = write {
                if state.operation_index.contains_key(&op.id) {
                    return Err(StoreError::Conflict(format!("operation {} exists", op.id)));
                }
            }
        }

        let write_count = writes.len();
        for write in writes {
            match write {
                DocumentWrite::PutMember(member) => {
                    let version = state.member_version(&member.id).unwrap_or(0) + 1;
                    state.members.insert(member.id, (member, version));
                }
                DocumentWrite::InsertOperation(op) => {
                    let index = state.operations.len();
                    state.operation_index.insert(op.id, index);
                    state.operations.push(op);
                }
            }
        }

        if write_count > 0 {
            store.commits.fetch_add(1, Ordering::SeqCst);
        }
        debug!(writes = write_count, "Memory transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}
