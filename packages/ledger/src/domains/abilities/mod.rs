//! Ability evaluator - may this member create this kind of operation?
//!
//! Pure: everything it needs is passed in as a snapshot, so it can run on
//! whatever the current transaction has already read.

use tracing::warn;

use crate::common::{LedgerError, MemberId};
use crate::domains::member::models::Member;
use crate::domains::operations::models::OpCode;
use crate::domains::policy::EconomicPolicy;
use crate::kernel::{CommandEnv, LedgerTxn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityEvaluator {
    flag_verification_threshold: u32,
}

impl AbilityEvaluator {
    pub fn new(flag_verification_threshold: u32) -> Self {
        Self {
            flag_verification_threshold,
        }
    }

    pub fn from_policy(policy: &EconomicPolicy) -> Self {
        Self::new(policy.flag_verification_threshold)
    }

    /// `member` is `None` when the caller has no member record yet.
    pub fn can_create_operation(&self, op_code: OpCode, member: Option<&Member>) -> bool {
        match (op_code, member) {
            (OpCode::CreateMember, None) => true,
            (OpCode::CreateMember, Some(_)) => false,
            (_, None) => false,
            (OpCode::EditMember | OpCode::RequestVerification, Some(_)) => true,
            (
                OpCode::Give | OpCode::Invite | OpCode::Mint | OpCode::Trust | OpCode::Verify,
                Some(member),
            ) => member.is_in_good_standing(),
            (OpCode::FlagMember | OpCode::ResolveFlagMember, Some(member)) => {
                member.is_in_good_standing()
                    && member.verified_by_count >= self.flag_verification_threshold
            }
        }
    }

    /// Same check for an op code that arrived as a raw string. Unknown codes
    /// are denied, never allowed.
    pub fn can_create_raw(&self, op_code: &str, member: Option<&Member>) -> bool {
        match op_code.parse::<OpCode>() {
            Ok(op_code) => self.can_create_operation(op_code, member),
            Err(_) => {
                warn!(op_code, "Ability check for unknown operation code");
                false
            }
        }
    }

    pub fn ensure(&self, op_code: OpCode, member: Option<&Member>) -> Result<(), LedgerError> {
        if self.can_create_operation(op_code, member) {
            Ok(())
        } else {
            Err(LedgerError::AbilityDenied(op_code))
        }
    }
}

/// Read the acting member inside the transaction and check its ability.
///
/// A missing actor is an ability failure: only CREATE_MEMBER is allowed
/// without a member record.
pub async fn authorize(
    txn: &mut LedgerTxn,
    env: &CommandEnv<'_>,
    actor_id: MemberId,
    op_code: OpCode,
) -> Result<Member, LedgerError> {
    let member = txn.member(actor_id).await?;
    env.abilities.ensure(op_code, member.as_ref())?;
    member.ok_or(LedgerError::AbilityDenied(op_code))
}
