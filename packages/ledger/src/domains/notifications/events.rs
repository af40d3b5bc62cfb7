use serde::{Deserialize, Serialize};

use crate::common::{Amount, MemberId, OperationId};
use crate::domains::operations::models::MintType;

/// Ledger events - FACT EVENTS ONLY
///
/// Emitted by commands inside their transaction and published to the outbox
/// only after the commit succeeded. Rejections are `Err`, never events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    MemberCreated {
        member_id: MemberId,
        inviter_id: Option<MemberId>,
    },

    MemberEdited {
        member_id: MemberId,
    },

    VerificationRequested {
        from: MemberId,
        to: MemberId,
    },

    MemberVerified {
        by: MemberId,
        member_id: MemberId,
        /// This verification confirmed the member's invitation
        invite_confirmed: bool,
    },

    /// Invite email address never reaches the log, only this event
    InviteCreated {
        inviter_id: MemberId,
        invite_token: String,
        invite_email: Option<String>,
    },

    MemberTrusted {
        from: MemberId,
        to: MemberId,
    },

    MemberFlagged {
        by: MemberId,
        member_id: MemberId,
        flag_operation_id: OperationId,
    },

    FlagResolved {
        by: MemberId,
        member_id: MemberId,
        flag_operation_id: OperationId,
    },

    Minted {
        member_id: MemberId,
        mint_type: MintType,
        amount: Amount,
    },

    Given {
        from: MemberId,
        to: MemberId,
        amount: Amount,
        net_amount: Amount,
        donation_to: MemberId,
        donation_amount: Amount,
    },
}
