//! Edit member action - update profile and donation settings

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::common::{LedgerError, MemberId};
use crate::domains::abilities::authorize;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{EditMemberData, OpCode, Operation, OperationData};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

/// Change profile and donation settings.
#[derive(Debug, Clone)]
pub struct EditMember {
    pub actor_id: MemberId,
    pub data: EditMemberData,
}

impl EditMember {
    /// Trimmed payload, rejecting blank names and out-of-range rates.
    fn normalized(&self) -> Result<EditMemberData, LedgerError> {
        if self.data.is_empty() {
            return Err(LedgerError::MissingParams(
                "one of full_name, username, donation_rate, donation_to_member_id".into(),
            ));
        }

        let trimmed = |field: &Option<String>, name: &str| match field.as_deref().map(str::trim) {
            Some("") => Err(LedgerError::MissingParams(format!("{} must not be blank", name))),
            other => Ok(other.map(str::to_string)),
        };

        if let Some(rate) = self.data.donation_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(LedgerError::InvalidAmount(format!(
                    "donation_rate {} must be between 0 and 1",
                    rate
                )));
            }
        }

        Ok(EditMemberData {
            full_name: trimmed(&self.data.full_name, "full_name")?,
            username: trimmed(&self.data.username, "username")?,
            donation_rate: self.data.donation_rate,
            donation_to_member_id: self.data.donation_to_member_id,
        })
    }
}

#[async_trait]
impl LedgerCommand for EditMember {
    fn op_code(&self) -> OpCode {
        OpCode::EditMember
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        let mut member = authorize(txn, env, self.actor_id, OpCode::EditMember).await?;
        let data = self.normalized()?;

        if let Some(recipient) = data.donation_to_member_id {
            if recipient != self.actor_id {
                txn.require_member(recipient).await?;
            }
        }

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

        txn.put_member(member);
        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::EditMember(data),
            env.now,
        ));
        txn.emit(LedgerEvent::MemberEdited {
            member_id: self.actor_id,
        });

        info!(member_id = %self.actor_id, "Member edited");
        Ok(StatusHint::Created)
    }
}
