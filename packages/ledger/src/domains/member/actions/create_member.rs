//! Create member action - first operation of every member

use async_trait::async_trait;
use tracing::{debug, info};

use crate::common::{LedgerError, MediaReference, MemberId};
use crate::domains::member::models::Member;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation, OperationData, OperationQuery};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

/// Create the caller's member record.
///
/// With an invite token the new member is linked to the inviter and a
/// REQUEST_VERIFICATION to the inviter is appended in the same transaction.
#[derive(Debug, Clone)]
pub struct CreateMember {
    /// Verified identity of the caller; becomes the member id
    pub member_id: MemberId,
    pub full_name: String,
    pub username: String,
    pub identity_video: MediaReference,
    pub invite_token: Option<String>,
}

impl CreateMember {
    fn invite_token(&self) -> Option<&str> {
        self.invite_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    async fn resolve_inviter(
        &self,
        txn: &mut LedgerTxn,
        token: &str,
    ) -> Result<MemberId, LedgerError> {
        let invites = txn
            .find_operations(&OperationQuery::op_code(OpCode::Invite).with_invite_token(token))
            .await?;

        let invite = match invites.as_slice() {
            [invite] => invite,
            [] => return Err(LedgerError::InvalidInviteToken),
            _ => {
                debug!(token, count = invites.len(), "Invite token matches several invites");
                return Err(LedgerError::InvalidInviteToken);
            }
        };

        let inviter_id = invite
            .creator_id
            .ok_or(LedgerError::InvalidInviteOperation(invite.id))?;
        if txn.member(inviter_id).await?.is_none() {
            return Err(LedgerError::InvalidInviteOperation(invite.id));
        }
        Ok(inviter_id)
    }
}

#[async_trait]
impl LedgerCommand for CreateMember {
    fn op_code(&self) -> OpCode {
        OpCode::CreateMember
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        let existing = txn.member(self.member_id).await?;
        if existing.is_some() {
            return Err(LedgerError::MemberAlreadyExists(self.member_id));
        }
        env.abilities.ensure(OpCode::CreateMember, None)?;

        let full_name = self.full_name.trim();
        let username = self.username.trim();
        if full_name.is_empty() || username.is_empty() {
            return Err(LedgerError::MissingParams(
                "full_name and username are required".into(),
            ));
        }
        env.media
            .validate(&self.identity_video)
            .map_err(|e| LedgerError::InvalidMedia(e.to_string()))?;

        let inviter_id = match self.invite_token() {
            Some(token) => Some(self.resolve_inviter(txn, token).await?),
            None => None,
        };

        // Writes
        txn.append(Operation::new(
            Some(self.member_id),
            OperationData::CreateMember {
                full_name: full_name.to_string(),
                username: username.to_string(),
                identity_video: self.identity_video.clone(),
                invite_token: self.invite_token().map(str::to_string),
            },
            env.now,
        ));

        if let Some(inviter_id) = inviter_id {
            txn.append(Operation::new(
                Some(self.member_id),
                OperationData::RequestVerification {
                    to_member_id: inviter_id,
                    invite_token: self.invite_token().map(str::to_string),
                },
                env.now,
            ));
        }

        let mut member = Member::new(self.member_id, full_name, username, env.now);
        member.request_invite_from_member_id = inviter_id;
        txn.put_member(member);

        txn.emit(LedgerEvent::MemberCreated {
            member_id: self.member_id,
            inviter_id,
        });
        if let Some(inviter_id) = inviter_id {
            txn.emit(LedgerEvent::VerificationRequested {
                from: self.member_id,
                to: inviter_id,
            });
        }

        info!(member_id = %self.member_id, invited = inviter_id.is_some(), "Member created");
        Ok(StatusHint::Created)
    }
}
