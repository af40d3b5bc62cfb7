use super::operation::{MintType, OpCode, Operation};
use crate::common::MemberId;

/// Conjunctive filter over the operation log.
///
/// Every field that is set must match. Stores translate this into their own
/// query language; [`OperationQuery::matches`] is the reference semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationQuery {
    pub creator_id: Option<MemberId>,
    pub op_code: Option<OpCode>,
    pub target_member_id: Option<MemberId>,
    pub mint_type: Option<MintType>,
    pub invite_token: Option<String>,
}

impl OperationQuery {
    /// Matches every operation.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn op_code(op_code: OpCode) -> Self {
        Self {
            op_code: Some(op_code),
            ..Self::default()
        }
    }

    pub fn created_by(mut self, creator_id: MemberId) -> Self {
        self.creator_id = Some(creator_id);
        self
    }

    pub fn targeting(mut self, member_id: MemberId) -> Self {
        self.target_member_id = Some(member_id);
        self
    }

    pub fn with_mint_type(mut self, mint_type: MintType) -> Self {
        self.mint_type = Some(mint_type);
        self
    }

    pub fn with_invite_token(mut self, token: impl Into<String>) -> Self {
        self.invite_token = Some(token.into());
        self
    }

    pub fn matches(&self, operation: &Operation) -> bool {
        let data = &operation.data;
        self.creator_id
            .map_or(true, |id| operation.creator_id == Some(id))
            && self.op_code.map_or(true, |op| data.op_code() == op)
            && self
                .target_member_id
                .map_or(true, |id| data.target_member_id() == Some(id))
            && self
                .mint_type
                .map_or(true, |mint_type| data.mint_type() == Some(mint_type))
            && self
                .invite_token
                .as_deref()
                .map_or(true, |token| data.invite_token() == Some(token))
    }
}
