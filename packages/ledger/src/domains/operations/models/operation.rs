use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::{Amount, LedgerError, MediaReference, MemberId, OperationId};

/// Operation codes, one per kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpCode {
    CreateMember,
    EditMember,
    RequestVerification,
    Verify,
    Invite,
    Trust,
    FlagMember,
    ResolveFlagMember,
    Mint,
    Give,
}

impl OpCode {
    pub const ALL: [OpCode; 10] = [
        OpCode::CreateMember,
        OpCode::EditMember,
        OpCode::RequestVerification,
        OpCode::Verify,
        OpCode::Invite,
        OpCode::Trust,
        OpCode::FlagMember,
        OpCode::ResolveFlagMember,
        OpCode::Mint,
        OpCode::Give,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateMember => "CREATE_MEMBER",
            Self::EditMember => "EDIT_MEMBER",
            Self::RequestVerification => "REQUEST_VERIFICATION",
            Self::Verify => "VERIFY",
            Self::Invite => "INVITE",
            Self::Trust => "TRUST",
            Self::FlagMember => "FLAG_MEMBER",
            Self::ResolveFlagMember => "RESOLVE_FLAG_MEMBER",
            Self::Mint => "MINT",
            Self::Give => "GIVE",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpCode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpCode::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| LedgerError::UnknownOpCode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintType {
    BasicIncome,
    ReferralBonus,
    InvitedBonus,
}

impl MintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicIncome => "BASIC_INCOME",
            Self::ReferralBonus => "REFERRAL_BONUS",
            Self::InvitedBonus => "INVITED_BONUS",
        }
    }
}

/// MINT payload. Also used as the mint request itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintData {
    BasicIncome {
        amount: Amount,
    },
    ReferralBonus {
        amount: Amount,
        invited_member_id: MemberId,
    },
    InvitedBonus {
        amount: Amount,
    },
}

impl MintData {
    pub fn mint_type(&self) -> MintType {
        match self {
            Self::BasicIncome { .. } => MintType::BasicIncome,
            Self::ReferralBonus { .. } => MintType::ReferralBonus,
            Self::InvitedBonus { .. } => MintType::InvitedBonus,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            Self::BasicIncome { amount }
            | Self::ReferralBonus { amount, .. }
            | Self::InvitedBonus { amount } => *amount,
        }
    }

    /// Same payload with a different amount.
    pub fn with_amount(&self, amount: Amount) -> Self {
        match self {
            Self::BasicIncome { .. } => Self::BasicIncome { amount },
            Self::ReferralBonus {
                invited_member_id, ..
            } => Self::ReferralBonus {
                amount,
                invited_member_id: *invited_member_id,
            },
            Self::InvitedBonus { .. } => Self::InvitedBonus { amount },
        }
    }
}

/// Editable member fields. At least one must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditMemberData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_to_member_id: Option<MemberId>,
}

impl EditMemberData {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.username.is_none()
            && self.donation_rate.is_none()
            && self.donation_to_member_id.is_none()
    }
}

/// Operation payload, keyed by op code.
///
/// Serialized adjacently tagged (`{"op_code": "GIVE", "data": {...}}`), so an
/// unknown op code fails to deserialize instead of falling through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op_code", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationData {
    CreateMember {
        full_name: String,
        username: String,
        identity_video: MediaReference,
        invite_token: Option<String>,
    },
    EditMember(EditMemberData),
    RequestVerification {
        to_member_id: MemberId,
        invite_token: Option<String>,
    },
    Verify {
        to_member_id: MemberId,
        video: MediaReference,
    },
    Invite {
        invite_token: String,
        video: MediaReference,
        is_joint_video: bool,
    },
    Trust {
        to_member_id: MemberId,
    },
    FlagMember {
        to_member_id: MemberId,
        reason: String,
    },
    ResolveFlagMember {
        to_member_id: MemberId,
        flag_operation_id: OperationId,
        reason: String,
    },
    Mint(MintData),
    Give {
        to_member_id: MemberId,
        amount: Amount,
        donation_to_member_id: MemberId,
        donation_amount: Amount,
        memo: Option<String>,
    },
}

impl OperationData {
    pub fn op_code(&self) -> OpCode {
        match self {
            Self::CreateMember { .. } => OpCode::CreateMember,
            Self::EditMember(_) => OpCode::EditMember,
            Self::RequestVerification { .. } => OpCode::RequestVerification,
            Self::Verify { .. } => OpCode::Verify,
            Self::Invite { .. } => OpCode::Invite,
            Self::Trust { .. } => OpCode::Trust,
            Self::FlagMember { .. } => OpCode::FlagMember,
            Self::ResolveFlagMember { .. } => OpCode::ResolveFlagMember,
            Self::Mint(_) => OpCode::Mint,
            Self::Give { .. } => OpCode::Give,
        }
    }

    /// The member this operation points at, if any.
    ///
    /// For referral-bonus mints this is the invited member.
    pub fn target_member_id(&self) -> Option<MemberId> {
        match self {
            Self::RequestVerification { to_member_id, .. }
            | Self::Verify { to_member_id, .. }
            | Self::Trust { to_member_id }
            | Self::FlagMember { to_member_id, .. }
            | Self::ResolveFlagMember { to_member_id, .. }
            | Self::Give { to_member_id, .. } => Some(*to_member_id),
            Self::Mint(MintData::ReferralBonus {
                invited_member_id, ..
            }) => Some(*invited_member_id),
            Self::Mint(_) | Self::CreateMember { .. } | Self::EditMember(_) | Self::Invite { .. } => {
                None
            }
        }
    }

    pub fn mint_type(&self) -> Option<MintType> {
        match self {
            Self::Mint(mint) => Some(mint.mint_type()),
            _ => None,
        }
    }

    /// Token of an INVITE operation.
    pub fn invite_token(&self) -> Option<&str> {
        match self {
            Self::Invite { invite_token, .. } => Some(invite_token.as_str()),
            _ => None,
        }
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub creator_id: Option<MemberId>,
    pub data: OperationData,
    pub created_at: DateTime<Utc>,
}

impl Operation {
    pub fn new(creator_id: Option<MemberId>, data: OperationData, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OperationId::new(),
            creator_id,
            data,
            created_at,
        }
    }

    pub fn op_code(&self) -> OpCode {
        self.data.op_code()
    }
}
