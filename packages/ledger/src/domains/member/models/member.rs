use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::{Amount, LedgerError, MemberId, OperationId};

/// Member projection - the derived state kept next to the operation log.
///
/// Only ever changed as a side effect of committing an operation, in the
/// same transaction as the append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub full_name: String,
    pub username: String,

    // Economy
    pub balance: Amount,
    pub last_minted_at: Option<DateTime<Utc>>,
    pub donation_rate: Option<Decimal>,
    pub donation_to_member_id: Option<MemberId>,

    // Invitation / verification
    pub invite_confirmed: bool,
    pub request_invite_from_member_id: Option<MemberId>,
    pub verified_by_count: u32,
    pub flagging_operation_ids: Vec<OperationId>,

    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn new(
        id: MemberId,
        full_name: impl Into<String>,
        username: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            username: username.into(),
            balance: Amount::ZERO,
            last_minted_at: None,
            donation_rate: None,
            donation_to_member_id: None,
            invite_confirmed: false,
            request_invite_from_member_id: None,
            verified_by_count: 0,
            flagging_operation_ids: Vec::new(),
            created_at,
        }
    }

    /// Verified by at least one member and no open flags.
    pub fn is_in_good_standing(&self) -> bool {
        self.verified_by_count > 0 && self.flagging_operation_ids.is_empty()
    }

    /// Basic income accrues from the last mint, or from joining.
    pub fn accrual_start(&self) -> DateTime<Utc> {
        self.last_minted_at.unwrap_or(self.created_at)
    }

    pub fn credit(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{} overflows balance", amount)))?;
        Ok(())
    }

    /// Debit, refusing to go below zero.
    pub fn debit(&mut self, amount: Amount) -> Result<(), LedgerError> {
        let insufficient = || LedgerError::InsufficientBalance {
            balance: self.balance,
            requested: amount,
        };
        let remaining = self.balance.checked_sub(amount).ok_or_else(insufficient)?;
        if remaining.is_negative() {
            return Err(insufficient());
        }
        self.balance = remaining;
        Ok(())
    }

    pub fn add_flag(&mut self, flag_operation_id: OperationId) {
        if !self.flagging_operation_ids.contains(&flag_operation_id) {
            self.flagging_operation_ids.push(flag_operation_id);
        }
    }

    /// Returns false when the flag was not open.
    pub fn remove_flag(&mut self, flag_operation_id: OperationId) -> bool {
        let before = self.flagging_operation_ids.len();
        self.flagging_operation_ids
            .retain(|id| *id != flag_operation_id);
        self.flagging_operation_ids.len() != before
    }
}
