//! Mint action - the only way new currency enters the ledger
//!
//! Three kinds of mint, each capped by the economic policy:
//!   BASIC_INCOME   accrues linearly since the last mint (or joining)
//!   REFERRAL_BONUS once per confirmed invitee, paid to the inviter
//!   INVITED_BONUS  once per member, after their invite is confirmed

use async_trait::async_trait;
use tracing::info;

use crate::common::{Amount, LedgerError, MemberId};
use crate::domains::abilities::authorize;
use crate::domains::member::models::Member;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{
    MintData, MintType, OpCode, Operation, OperationData, OperationQuery,
};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

#[derive(Debug, Clone)]
pub struct Mint {
    pub actor_id: MemberId,
    pub data: MintData,
}

fn ensure_within(requested: Amount, max: Amount) -> Result<(), LedgerError> {
    if requested > max {
        return Err(LedgerError::AmountTooLarge { requested, max });
    }
    Ok(())
}

impl Mint {
    async fn already_minted(
        &self,
        txn: &mut LedgerTxn,
        mint_type: MintType,
        invited_member_id: Option<MemberId>,
    ) -> Result<bool, LedgerError> {
        let mut query = OperationQuery::op_code(OpCode::Mint)
            .created_by(self.actor_id)
            .with_mint_type(mint_type);
        if let Some(invited) = invited_member_id {
            query = query.targeting(invited);
        }
        Ok(txn.find_operation(&query).await?.is_some())
    }

    /// Check the request against the policy. Returns nothing on success; the
    /// caller applies the credit.
    async fn check_allowance(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
        actor: &Member,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        match &self.data {
            MintData::BasicIncome { .. } => {
                let max = env.policy.max_basic_income(actor.accrual_start(), env.now);
                ensure_within(amount, max)
            }
            MintData::ReferralBonus {
                invited_member_id, ..
            } => {
                let invited_member_id = *invited_member_id;
                if invited_member_id == self.actor_id {
                    return Err(LedgerError::InvalidTarget(
                        "cannot claim a referral bonus for yourself".into(),
                    ));
                }
                if self
                    .already_minted(txn, MintType::ReferralBonus, Some(invited_member_id))
                    .await?
                {
                    return Err(LedgerError::AlreadyMinted);
                }

                let invited = txn.require_member(invited_member_id).await?;
                if invited.request_invite_from_member_id != Some(self.actor_id) {
                    return Err(LedgerError::NotEligible(
                        "member was not invited by you".into(),
                    ));
                }
                if !invited.invite_confirmed {
                    return Err(LedgerError::NotEligible(
                        "invite has not been confirmed".into(),
                    ));
                }
                ensure_within(amount, env.policy.referral_bonus_for(invited.created_at))
            }
            MintData::InvitedBonus { .. } => {
                if !actor.invite_confirmed {
                    return Err(LedgerError::NotEligible(
                        "invite has not been confirmed".into(),
                    ));
                }
                if self
                    .already_minted(txn, MintType::InvitedBonus, None)
                    .await?
                {
                    return Err(LedgerError::AlreadyMinted);
                }
                ensure_within(amount, env.policy.invited_bonus_for(actor.created_at))
            }
        }
    }
}

#[async_trait]
impl LedgerCommand for Mint {
    fn op_code(&self) -> OpCode {
        OpCode::Mint
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        let amount = self.data.amount().round_down();
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "mint amount must be positive, got {}",
                self.data.amount()
            )));
        }

        let mut actor = authorize(txn, env, self.actor_id, OpCode::Mint).await?;
        self.check_allowance(txn, env, &actor, amount).await?;

        let mint_type = self.data.mint_type();
        actor.credit(amount)?;
        if mint_type == MintType::BasicIncome {
            actor.last_minted_at = Some(env.now);
        }

        txn.put_member(actor);
        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::Mint(self.data.with_amount(amount)),
            env.now,
        ));
        txn.emit(LedgerEvent::Minted {
            member_id: self.actor_id,
            mint_type,
            amount,
        });

        info!(
            member_id = %self.actor_id,
            mint_type = mint_type.as_str(),
            amount = %amount,
            "Minted"
        );
        Ok(StatusHint::Created)
    }
}
