//! Request verification action - ask another member to verify you

use async_trait::async_trait;
use tracing::info;

use crate::common::{LedgerError, MemberId};
use crate::domains::abilities::authorize;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation, OperationData};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

/// Ask another member to verify the caller. Log-only; the projection is
/// untouched until the VERIFY arrives.
#[derive(Debug, Clone)]
pub struct RequestVerification {
    pub actor_id: MemberId,
    pub to_member_id: MemberId,
}

#[async_trait]
impl LedgerCommand for RequestVerification {
    fn op_code(&self) -> OpCode {
        OpCode::RequestVerification
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        if self.to_member_id == self.actor_id {
            return Err(LedgerError::InvalidTarget(
                "cannot request verification from yourself".into(),
            ));
        }
        authorize(txn, env, self.actor_id, OpCode::RequestVerification).await?;
        txn.require_member(self.to_member_id).await?;

        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::RequestVerification {
                to_member_id: self.to_member_id,
                invite_token: None,
            },
            env.now,
        ));
        txn.emit(LedgerEvent::VerificationRequested {
            from: self.actor_id,
            to: self.to_member_id,
        });

        info!(from = %self.actor_id, to = %self.to_member_id, "Verification requested");
        Ok(StatusHint::Created)
    }
}
