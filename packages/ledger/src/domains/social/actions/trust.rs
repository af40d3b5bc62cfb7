//! Trust action - one-way endorsement of another member

use async_trait::async_trait;
use tracing::info;

use crate::common::{LedgerError, MemberId};
use crate::domains::abilities::authorize;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation, OperationData, OperationQuery};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

/// Mark another member as trusted. At most once per (actor, target).
#[derive(Debug, Clone)]
pub struct Trust {
    pub actor_id: MemberId,
    pub to_member_id: MemberId,
}

#[async_trait]
impl LedgerCommand for Trust {
    fn op_code(&self) -> OpCode {
        OpCode::Trust
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        if self.to_member_id == self.actor_id {
            return Err(LedgerError::InvalidTarget("cannot trust yourself".into()));
        }
        authorize(txn, env, self.actor_id, OpCode::Trust).await?;
        txn.require_member(self.to_member_id).await?;

        let query = OperationQuery::op_code(OpCode::Trust)
            .created_by(self.actor_id)
            .targeting(self.to_member_id);
        if txn.find_operation(&query).await?.is_some() {
            return Err(LedgerError::AlreadyTrusted(self.to_member_id));
        }

        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::Trust {
                to_member_id: self.to_member_id,
            },
            env.now,
        ));
        txn.emit(LedgerEvent::MemberTrusted {
            from: self.actor_id,
            to: self.to_member_id,
        });

        info!(from = %self.actor_id, to = %self.to_member_id, "Member trusted");
        Ok(StatusHint::Created)
    }
}
