//! Invite action - reserve an invite token for someone who has not joined yet

use async_trait::async_trait;
use tracing::info;

use crate::common::{LedgerError, MediaReference, MemberId};
use crate::domains::abilities::authorize;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation, OperationData, OperationQuery};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

/// Publish an invite token that a newcomer can redeem in CREATE_MEMBER.
#[derive(Debug, Clone)]
pub struct Invite {
    pub actor_id: MemberId,
    pub invite_token: String,
    pub video: MediaReference,
    pub is_joint_video: bool,
    /// Only carried on the event, never written to the log
    pub invite_email: Option<String>,
}

#[async_trait]
impl LedgerCommand for Invite {
    fn op_code(&self) -> OpCode {
        OpCode::Invite
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        authorize(txn, env, self.actor_id, OpCode::Invite).await?;

        let token = self.invite_token.trim();
        if token.is_empty() {
            return Err(LedgerError::MissingParams("invite_token".into()));
        }
        env.media
            .validate(&self.video)
            .map_err(|e| LedgerError::InvalidMedia(e.to_string()))?;

        let existing = txn
            .find_operation(&OperationQuery::op_code(OpCode::Invite).with_invite_token(token))
            .await?;
        if existing.is_some() {
            return Err(LedgerError::InviteTokenInUse);
        }

        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::Invite {
                invite_token: token.to_string(),
                video: self.video.clone(),
                is_joint_video: self.is_joint_video,
            },
            env.now,
        ));
        txn.emit(LedgerEvent::InviteCreated {
            inviter_id: self.actor_id,
            invite_token: token.to_string(),
            invite_email: self
                .invite_email
                .as_deref()
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(str::to_string),
        });

        info!(member_id = %self.actor_id, "Invite created");
        Ok(StatusHint::Created)
    }
}
