use thiserror::Error;

use super::amount::Amount;
use super::entity_ids::{MemberId, OperationId};
use crate::domains::operations::models::OpCode;
use crate::kernel::store::StoreError;

/// Coarse error taxonomy, used to pick an HTTP status for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    Ability,
    NotFound,
    Conflict,
    Policy,
    MalformedInput,
    Fatal,
}

/// Ledger errors.
///
/// Everything except `Store` contention is a deterministic validation
/// failure and is never retried. Retryable store errors are consumed by the
/// transaction coordinator and only surface as `TransactionFailed`.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    #[error("Member is not allowed to create {0} operations")]
    AbilityDenied(OpCode),

    #[error("Unknown operation code: {0}")]
    UnknownOpCode(String),

    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("Operation not found: {0}")]
    OperationNotFound(OperationId),

    #[error("Invite token does not match an invite")]
    InvalidInviteToken,

    #[error("Invite operation {0} is missing required fields")]
    InvalidInviteOperation(OperationId),

    #[error("Member already exists: {0}")]
    MemberAlreadyExists(MemberId),

    #[error("Bonus has already been minted")]
    AlreadyMinted,

    #[error("Member {0} is already trusted")]
    AlreadyTrusted(MemberId),

    #[error("Invite token is already in use")]
    InviteTokenInUse,

    #[error("Amount {requested} exceeds the allowed maximum of {max}")]
    AmountTooLarge { requested: Amount, max: Amount },

    #[error("Insufficient balance: {balance} available, {requested} requested")]
    InsufficientBalance { balance: Amount, requested: Amount },

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Missing parameters: {0}")]
    MissingParams(String),

    #[error("Invalid media reference: {0}")]
    InvalidMedia(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Operation {0} is not an open flag on this member")]
    InvalidFlagOperation(OperationId),

    #[error("Transaction failed after {attempts} attempts")]
    TransactionFailed { attempts: u32 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::AbilityDenied(_) | Self::UnknownOpCode(_) => ErrorKind::Ability,
            Self::MemberNotFound(_) | Self::OperationNotFound(_) | Self::InvalidInviteToken => {
                ErrorKind::NotFound
            }
            Self::MemberAlreadyExists(_)
            | Self::AlreadyMinted
            | Self::AlreadyTrusted(_)
            | Self::InviteTokenInUse => ErrorKind::Conflict,
            Self::AmountTooLarge { .. } | Self::InsufficientBalance { .. } | Self::NotEligible(_) => {
                ErrorKind::Policy
            }
            Self::InvalidInviteOperation(_)
            | Self::MissingParams(_)
            | Self::InvalidMedia(_)
            | Self::InvalidAmount(_)
            | Self::InvalidTarget(_)
            | Self::InvalidFlagOperation(_) => ErrorKind::MalformedInput,
            Self::TransactionFailed { .. } | Self::Store(_) | Self::Internal(_) => ErrorKind::Fatal,
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_hint(&self) -> u16 {
        match self.kind() {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Ability => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Policy | ErrorKind::MalformedInput => 400,
            ErrorKind::Fatal => 500,
        }
    }

    /// Store contention that the coordinator should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}
