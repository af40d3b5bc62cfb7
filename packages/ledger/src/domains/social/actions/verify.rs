//! Verify action - vouch for a member's identity video, idempotent per pair

use async_trait::async_trait;
use tracing::{debug, info};

use crate::common::{LedgerError, MediaReference, MemberId};
use crate::domains::abilities::authorize;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation, OperationData, OperationQuery};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

/// Vouch for another member's identity.
///
/// Idempotent per (actor, target): a repeat returns the original VERIFY
/// with `StatusHint::Ok` and writes nothing.
#[derive(Debug, Clone)]
pub struct Verify {
    pub actor_id: MemberId,
    pub to_member_id: MemberId,
    pub video: MediaReference,
}

#[async_trait]
impl LedgerCommand for Verify {
    fn op_code(&self) -> OpCode {
        OpCode::Verify
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        if self.to_member_id == self.actor_id {
            return Err(LedgerError::InvalidTarget("cannot verify yourself".into()));
        }
        authorize(txn, env, self.actor_id, OpCode::Verify).await?;
        env.media
            .validate(&self.video)
            .map_err(|e| LedgerError::InvalidMedia(e.to_string()))?;

        let mut target = txn.require_member(self.to_member_id).await?;

        let query = OperationQuery::op_code(OpCode::Verify)
            .created_by(self.actor_id)
            .targeting(self.to_member_id);
        if let Some(existing) = txn.find_operation(&query).await? {
            debug!(operation_id = %existing.id, "Verification already recorded");
            txn.reuse(existing);
            return Ok(StatusHint::Ok);
        }

        let confirms_invite = target.request_invite_from_member_id == Some(self.actor_id);
        target.verified_by_count += 1;
        if confirms_invite {
            target.invite_confirmed = true;
        }

        txn.put_member(target);
        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::Verify {
                to_member_id: self.to_member_id,
                video: self.video.clone(),
            },
            env.now,
        ));
        txn.emit(LedgerEvent::MemberVerified {
            by: self.actor_id,
            member_id: self.to_member_id,
            invite_confirmed: confirms_invite,
        });

        info!(
            by = %self.actor_id,
            member_id = %self.to_member_id,
            confirms_invite,
            "Member verified"
        );
        Ok(StatusHint::Created)
    }
}
