//! Flag actions - open and resolve flags on a member
//!
//! An open flag is the id of its FLAG_MEMBER operation in the target's
//! `flagging_operation_ids`. Any open flag takes the member out of good
//! standing.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::common::{LedgerError, MemberId, OperationId};
use crate::domains::abilities::authorize;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation, OperationData};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

#[derive(Debug, Clone)]
pub struct FlagMember {
    pub actor_id: MemberId,
    pub to_member_id: MemberId,
    pub reason: String,
}

#[async_trait]
impl LedgerCommand for FlagMember {
    fn op_code(&self) -> OpCode {
        OpCode::FlagMember
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        if self.to_member_id == self.actor_id {
            return Err(LedgerError::InvalidTarget("cannot flag yourself".into()));
        }
        authorize(txn, env, self.actor_id, OpCode::FlagMember).await?;
        let mut target = txn.require_member(self.to_member_id).await?;

        let operation = Operation::new(
            Some(self.actor_id),
            OperationData::FlagMember {
                to_member_id: self.to_member_id,
                reason: self.reason.clone(),
            },
            env.now,
        );
        let flag_operation_id = operation.id;
        target.add_flag(flag_operation_id);

        txn.put_member(target);
        txn.append(operation);
        txn.emit(LedgerEvent::MemberFlagged {
            by: self.actor_id,
            member_id: self.to_member_id,
            flag_operation_id,
        });

        info!(
            by = %self.actor_id,
            member_id = %self.to_member_id,
            flag_operation_id = %flag_operation_id,
            "Member flagged"
        );
        Ok(StatusHint::Created)
    }
}

#[derive(Debug, Clone)]
pub struct ResolveFlagMember {
    pub actor_id: MemberId,
    pub to_member_id: MemberId,
    pub flag_operation_id: OperationId,
    pub reason: String,
}

#[async_trait]
impl LedgerCommand for ResolveFlagMember {
    fn op_code(&self) -> OpCode {
        OpCode::ResolveFlagMember
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        authorize(txn, env, self.actor_id, OpCode::ResolveFlagMember).await?;
        let mut target = txn.require_member(self.to_member_id).await?;

        let flag = txn
            .operation(self.flag_operation_id)
            .await?
            .ok_or(LedgerError::OperationNotFound(self.flag_operation_id))?;
        match flag.data {
            OperationData::FlagMember { to_member_id, .. } if to_member_id == self.to_member_id => {}
            _ => return Err(LedgerError::InvalidFlagOperation(self.flag_operation_id)),
        }

        if target.remove_flag(self.flag_operation_id) {
            txn.put_member(target);
        } else {
            warn!(
                member_id = %self.to_member_id,
                flag_operation_id = %self.flag_operation_id,
                "Flag was not open, recording resolution anyway"
            );
        }

        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::ResolveFlagMember {
                to_member_id: self.to_member_id,
                flag_operation_id: self.flag_operation_id,
                reason: self.reason.clone(),
            },
            env.now,
        ));
        txn.emit(LedgerEvent::FlagResolved {
            by: self.actor_id,
            member_id: self.to_member_id,
            flag_operation_id: self.flag_operation_id,
        });

        info!(
            by = %self.actor_id,
            member_id = %self.to_member_id,
            flag_operation_id = %self.flag_operation_id,
            "Flag resolved"
        );
        Ok(StatusHint::Created)
    }
}
