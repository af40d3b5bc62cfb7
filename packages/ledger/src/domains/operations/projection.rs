//! Projection replay.
//!
//! Folds the operation log back into member projections so the stored
//! projection can be audited against the log it was derived from.
//!
//! Replay runs in three passes: index INVITE tokens, create members, then
//! apply every other operation in log order. Balance arithmetic is not
//! overdraft-checked during replay and `last_minted_at` keeps the latest
//! mint, so operations on disjoint members may appear in any order.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

use crate::common::{Amount, LedgerError, MemberId, OperationId};
use crate::domains::member::models::Member;
use crate::domains::operations::models::{MintData, Operation, OperationData, OperationQuery};
use crate::kernel::{BaseDocumentStore, LedgerTxn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Operation {operation_id} references unknown member {member_id}")]
    UnknownMember {
        operation_id: OperationId,
        member_id: MemberId,
    },

    #[error("Operation {0} has no creator")]
    MissingCreator(OperationId),

    #[error("Member {member_id} is created twice (operation {operation_id})")]
    DuplicateMember {
        operation_id: OperationId,
        member_id: MemberId,
    },
}

/// A member whose stored projection disagrees with the replayed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionMismatch {
    pub member_id: MemberId,
    pub stored: Option<Member>,
    pub replayed: Option<Member>,
}

struct Replay {
    members: BTreeMap<MemberId, Member>,
    invites: HashMap<String, MemberId>,
}

impl Replay {
    fn member(&mut self, op: &Operation, id: MemberId) -> Result<&mut Member, ReplayError> {
        self.members.get_mut(&id).ok_or(ReplayError::UnknownMember {
            operation_id: op.id,
            member_id: id,
        })
    }

    fn creator(&mut self, op: &Operation) -> Result<&mut Member, ReplayError> {
        let id = op.creator_id.ok_or(ReplayError::MissingCreator(op.id))?;
        self.member(op, id)
    }

    fn create(&mut self, op: &Operation) -> Result<(), ReplayError> {
        let OperationData::CreateMember {
            full_name,
            username,
            invite_token,
            ..
        } = &op.data
        else {
            return Ok(());
        };

        let id = op.creator_id.ok_or(ReplayError::MissingCreator(op.id))?;
        if self.members.contains_key(&id) {
            return Err(ReplayError::DuplicateMember {
                operation_id: op.id,
                member_id: id,
            });
        }

        let mut member = Member::new(id, full_name.clone(), username.clone(), op.created_at);
        member.request_invite_from_member_id = invite_token
            .as_deref()
            .and_then(|token| self.invites.get(token).copied());
        self.members.insert(id, member);
        Ok(())
    }

    fn apply(&mut self, op: &Operation) -> Result<(), ReplayError> {
        match &op.data {
            OperationData::CreateMember { .. }
            | OperationData::Invite { .. }
            | OperationData::RequestVerification { .. }
            | OperationData::Trust { .. } => {}

            OperationData::EditMember(data) => {
                let member = self.creator(op)?;
                if let Some(full_name) = &data.full_name {
                    member.full_name = full_name.clone();
                }
                if let Some(username) = &data.username {
                    member.username = username.clone();
                }
                if let Some(rate) = data.donation_rate {
                    member.donation_rate = Some(rate);
                }
                if let Some(recipient) = data.donation_to_member_id {
                    member.donation_to_member_id = Some(recipient);
                }
            }

            OperationData::Verify { to_member_id, .. } => {
                let verifier = op.creator_id;
                let target = self.member(op, *to_member_id)?;
                target.verified_by_count += 1;
                if verifier.is_some() && target.request_invite_from_member_id == verifier {
                    target.invite_confirmed = true;
                }
            }

            OperationData::FlagMember { to_member_id, .. } => {
                self.member(op, *to_member_id)?.add_flag(op.id);
            }

            OperationData::ResolveFlagMember {
                to_member_id,
                flag_operation_id,
                ..
            } => {
                self.member(op, *to_member_id)?
                    .remove_flag(*flag_operation_id);
            }

            OperationData::Mint(mint) => {
                let created_at = op.created_at;
                let member = self.creator(op)?;
                member.balance += mint.amount();
                if let MintData::BasicIncome { .. } = mint {
                    member.last_minted_at = member.last_minted_at.max(Some(created_at));
                }
            }

            OperationData::Give {
                to_member_id,
                amount,
                donation_to_member_id,
                donation_amount,
                ..
            } => {
                // Resolve every party before mutating any of them
                self.member(op, *to_member_id)?;
                self.member(op, *donation_to_member_id)?;
                self.creator(op)?.balance -= *amount;
                self.member(op, *to_member_id)?.balance += *amount - *donation_amount;
                self.member(op, *donation_to_member_id)?.balance += *donation_amount;
            }
        }
        Ok(())
    }
}

/// Replay `operations` (in log order) on top of `genesis`.
///
/// `genesis` holds members that exist without a CREATE_MEMBER operation,
/// such as the default donation recipient.
pub fn replay(
    genesis: impl IntoIterator<Item = Member>,
    operations: &[Operation],
) -> Result<BTreeMap<MemberId, Member>, ReplayError> {
    let mut replay = Replay {
        members: genesis.into_iter().map(|m| (m.id, m)).collect(),
        invites: HashMap::new(),
    };

    for op in operations {
        if let (Some(token), Some(creator)) = (op.data.invite_token(), op.creator_id) {
            replay.invites.insert(token.to_string(), creator);
        }
    }
    for op in operations {
        replay.create(op)?;
    }
    for op in operations {
        replay.apply(op)?;
    }

    debug!(
        members = replay.members.len(),
        operations = operations.len(),
        "Replayed operation log"
    );
    Ok(replay.members)
}

/// Zeroed copies of stored members that no CREATE_MEMBER accounts for.
///
/// Profile and donation settings are kept; everything an operation can
/// change is reset.
pub fn baseline_genesis(stored: &[Member], operations: &[Operation]) -> Vec<Member> {
    let created: std::collections::HashSet<MemberId> = operations
        .iter()
        .filter(|op| matches!(op.data, OperationData::CreateMember { .. }))
        .filter_map(|op| op.creator_id)
        .collect();

    stored
        .iter()
        .filter(|member| !created.contains(&member.id))
        .map(|member| Member {
            balance: Amount::ZERO,
            last_minted_at: None,
            invite_confirmed: false,
            verified_by_count: 0,
            flagging_operation_ids: Vec::new(),
            ..member.clone()
        })
        .collect()
}

/// Compare stored projections with a replay, member by member.
pub fn audit(
    stored: &[Member],
    replayed: &BTreeMap<MemberId, Member>,
) -> Vec<ProjectionMismatch> {
    let stored_by_id: BTreeMap<MemberId, &Member> = stored.iter().map(|m| (m.id, m)).collect();

    let mut ids: Vec<MemberId> = stored_by_id.keys().chain(replayed.keys()).copied().collect();
    ids.sort();
    ids.dedup();

    ids.into_iter()
        .filter_map(|id| {
            let stored = stored_by_id.get(&id).copied();
            let replayed = replayed.get(&id);
            if stored == replayed {
                None
            } else {
                Some(ProjectionMismatch {
                    member_id: id,
                    stored: stored.cloned(),
                    replayed: replayed.cloned(),
                })
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AuditReport {
    pub members: usize,
    pub operations: usize,
    pub mismatches: Vec<ProjectionMismatch>,
}

/// Snapshot members and log in one read-only transaction, replay, compare.
pub async fn audit_store(store: &dyn BaseDocumentStore) -> Result<AuditReport, LedgerError> {
    let mut txn = LedgerTxn::new(store.begin().await?);
    let snapshot = async {
        let members = txn.list_members().await?;
        let operations = txn.find_operations(&OperationQuery::all()).await?;
        Ok::<_, LedgerError>((members, operations))
    }
    .await;
    txn.abort().await;
    let (stored, operations) = snapshot?;

    let genesis = baseline_genesis(&stored, &operations);
    let replayed = replay(genesis, &operations)
        .map_err(|e| LedgerError::Internal(anyhow::Error::new(e)))?;

    Ok(AuditReport {
        members: stored.len(),
        operations: operations.len(),
        mismatches: audit(&stored, &replayed),
    })
}
