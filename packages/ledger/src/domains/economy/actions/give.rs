//! Give action - transfer with a donation split
//!
//! The giver pays `amount`. The receiver keeps `amount - donation` and the
//! receiver's donation recipient gets `donation = round_down(amount * rate)`.
//! Any two of the three parties may be the same member; each member is
//! loaded once and written once.

use async_trait::async_trait;
use tracing::info;

use crate::common::{Amount, LedgerError, MemberId};
use crate::domains::abilities::authorize;
use crate::domains::member::models::Member;
use crate::domains::notifications::LedgerEvent;
use crate::domains::operations::models::{OpCode, Operation, OperationData};
use crate::kernel::{CommandEnv, LedgerCommand, LedgerTxn, StatusHint};

#[derive(Debug, Clone)]
pub struct Give {
    pub actor_id: MemberId,
    pub to_member_id: MemberId,
    pub amount: Amount,
    pub memo: Option<String>,
}

/// Members touched by one GIVE, deduplicated by id.
struct Parties(Vec<Member>);

impl Parties {
    fn contains(&self, id: MemberId) -> bool {
        self.0.iter().any(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MemberId) -> Result<&mut Member, LedgerError> {
        self.0
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(LedgerError::MemberNotFound(id))
    }
}

#[async_trait]
impl LedgerCommand for Give {
    fn op_code(&self) -> OpCode {
        OpCode::Give
    }

    async fn apply(
        &self,
        txn: &mut LedgerTxn,
        env: &CommandEnv<'_>,
    ) -> Result<StatusHint, LedgerError> {
        let amount = self.amount.round_down();
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "give amount must be positive, got {}",
                self.amount
            )));
        }
        if self.to_member_id == self.actor_id {
            return Err(LedgerError::InvalidTarget("cannot give to yourself".into()));
        }

        // Reads: giver, receiver, donation recipient
        let actor = authorize(txn, env, self.actor_id, OpCode::Give).await?;
        let target = txn.require_member(self.to_member_id).await?;

        let donation_to = target
            .donation_to_member_id
            .unwrap_or(env.policy.default_donation_recipient);
        let rate = target
            .donation_rate
            .unwrap_or(env.policy.default_donation_rate);

        let mut parties = Parties(vec![actor, target]);
        if !parties.contains(donation_to) {
            let recipient = txn.require_member(donation_to).await?;
            parties.0.push(recipient);
        }

        let donation = amount.mul_rate(rate).round_down();
        let net = amount - donation;

        parties.get_mut(self.actor_id)?.debit(amount)?;
        parties.get_mut(self.to_member_id)?.credit(net)?;
        parties.get_mut(donation_to)?.credit(donation)?;

        // Writes
        for member in parties.0 {
            txn.put_member(member);
        }
        txn.append(Operation::new(
            Some(self.actor_id),
            OperationData::Give {
                to_member_id: self.to_member_id,
                amount,
                donation_to_member_id: donation_to,
                donation_amount: donation,
                memo: self.memo.clone(),
            },
            env.now,
        ));
        txn.emit(LedgerEvent::Given {
            from: self.actor_id,
            to: self.to_member_id,
            amount,
            net_amount: net,
            donation_to,
            donation_amount: donation,
        });

        info!(
            from = %self.actor_id,
            to = %self.to_member_id,
            amount = %amount,
            donation = %donation,
            "Give recorded"
        );
        Ok(StatusHint::Created)
    }
}
